pub mod digikey;
pub mod element14;
pub mod mouser;

pub use digikey::DigiKeyAdapter;
pub use element14::Element14Adapter;
pub use mouser::MouserAdapter;
