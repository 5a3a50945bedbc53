pub mod cancel;
pub mod residue;
