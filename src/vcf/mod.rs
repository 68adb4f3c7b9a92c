pub mod filter;
pub mod rename;

pub use filter::{run_remove_nonstandard_variants, FilterSummary};
pub use rename::{run_extract_vcf, VcfSource};
