pub mod fasta;
pub mod peptides;
