pub mod archive;
pub mod ascat;
pub mod bedpe;
pub mod header;
pub mod index;
pub mod logging;
pub mod rewrite;
pub mod vcf;
