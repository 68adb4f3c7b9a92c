use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use log::info;

use sanger_tools::header::{run_check_bam_header, CheckMode};
use sanger_tools::logging::{init_logger, LogReporter};

/// Post-processing utilities for Sanger somatic pipeline outputs
#[derive(Parser, Debug)]
#[command(author, version, about = "Post-processing utilities for Sanger somatic pipeline outputs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that all read groups share one SM and use the ILLUMINA platform
    CheckBamHeader(CheckBamHeaderArgs),
    /// Check that all read groups share one SM
    CheckBamHeaderSamples(CheckBamHeaderArgs),
    /// Remove VCF records with alleles outside A, C, G, T
    RemoveNonstandardVariants(RemoveNonstandardArgs),
    /// Extract the brass VCF from a Sanger results archive
    ExtractBrassVcf(ExtractArchiveArgs),
    /// Extract the brass BEDPE from a Sanger results archive
    ExtractBrassBedpe(ExtractArchiveArgs),
    /// Extract the caveman VCF from a Sanger results archive
    ExtractCavemanVcf(ExtractArchiveArgs),
    /// Process the ASCAT outputs of a Sanger results archive
    ExtractAscat(ExtractAscatArgs),
    /// Print the command line reference as markdown
    #[command(hide = true)]
    MarkdownHelp,
}

#[derive(Args, Debug)]
pub struct CheckBamHeaderArgs {
    /// BAM file to check
    #[arg(long = "input_bam", required = true)]
    pub input_bam: PathBuf,

    /// Aliquot ID used as SM when the read groups need fixing
    #[arg(long = "aliquot_id", required = true)]
    pub aliquot_id: String,

    /// Path for the fixed header-only BAM, written only if needed
    #[arg(long = "output_header", required = true)]
    pub output_header: PathBuf,
}

impl CheckBamHeaderArgs {
    pub fn run(self, mode: CheckMode) -> Result<()> {
        info!("Processing bam {}", self.input_bam.display());
        let reporter = LogReporter::new(module_path!());
        run_check_bam_header(
            &self.input_bam,
            &self.aliquot_id,
            &self.output_header,
            mode,
            &reporter,
        )?;
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct RemoveNonstandardArgs {
    /// Input VCF, plain or BGZF-compressed
    #[arg(long = "input_vcf", required = true)]
    pub input_vcf: PathBuf,

    /// Output VCF; a name ending in gz is compressed and tabix indexed
    #[arg(long = "output_filename", required = true)]
    pub output_filename: PathBuf,
}

impl RemoveNonstandardArgs {
    pub fn run(self) -> Result<()> {
        use sanger_tools::vcf::run_remove_nonstandard_variants;

        run_remove_nonstandard_variants(&self.input_vcf, &self.output_filename)?;
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ExtractArchiveArgs {
    /// Sanger results tar archive
    #[arg(long = "results_archive", required = true)]
    pub results_archive: Utf8PathBuf,

    /// Prefix for all outputs
    #[arg(long = "output_prefix", required = true)]
    pub output_prefix: Utf8PathBuf,
}

impl ExtractArchiveArgs {
    pub fn run_vcf(self, source: sanger_tools::vcf::VcfSource) -> Result<()> {
        use sanger_tools::vcf::run_extract_vcf;

        info!("Processing results tar archive {}...", self.results_archive);
        run_extract_vcf(&self.results_archive, &self.output_prefix, source)?;
        Ok(())
    }

    pub fn run_bedpe(self) -> Result<()> {
        use sanger_tools::bedpe::run_extract_brass_bedpe;

        info!("Processing results tar archive {}...", self.results_archive);
        run_extract_brass_bedpe(&self.results_archive, &self.output_prefix)?;
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ExtractAscatArgs {
    #[command(subcommand)]
    pub command: AscatCommands,
}

#[derive(Subcommand, Debug)]
pub enum AscatCommands {
    /// Reformat the ASCAT copy number segments to the GDC layout
    ReformatCopynumber(ReformatCopynumberArgs),
    /// Print tumour purity and ploidy as JSON on stdout
    ExtractStats(ExtractStatsArgs),
}

#[derive(Args, Debug)]
pub struct ReformatCopynumberArgs {
    /// Sanger results tar archive
    #[arg(short = 'i', long = "input", required = true)]
    pub input: PathBuf,

    /// Path for the output TSV
    #[arg(short = 'o', long = "output", required = true)]
    pub output: PathBuf,

    /// GDC aliquot ID used to generate the archive
    #[arg(short = 'g', long = "gdcaliquot", required = true)]
    pub gdcaliquot: String,
}

#[derive(Args, Debug)]
pub struct ExtractStatsArgs {
    /// Sanger results tar archive
    #[arg(short = 'i', long = "input", required = true)]
    pub input: PathBuf,
}

impl ExtractAscatArgs {
    pub fn run(self) -> Result<()> {
        use sanger_tools::ascat::{extract_stats, reformat_copynumber};

        match self.command {
            AscatCommands::ReformatCopynumber(args) => {
                info!("Processing results tar archive {}...", args.input.display());
                reformat_copynumber(&args.input, &args.output, &args.gdcaliquot)?;
            }
            AscatCommands::ExtractStats(args) => {
                info!("Processing results tar archive {}...", args.input.display());
                let stats = extract_stats(&args.input)?;
                println!("{}", serde_json::to_string(&stats)?);
            }
        }
        Ok(())
    }
}

fn log_banner() {
    let rule = "-".repeat(80);
    info!("{}", rule);
    info!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!(
        "Program Args: {}",
        std::env::args().collect::<Vec<_>>().join(" ")
    );
    info!("{}", rule);
}

pub fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();

    if let Commands::MarkdownHelp = cli.command {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let start = Instant::now();
    log_banner();

    match cli.command {
        Commands::CheckBamHeader(args) => args.run(CheckMode::SamplesAndPlatforms),
        Commands::CheckBamHeaderSamples(args) => args.run(CheckMode::Samples),
        Commands::RemoveNonstandardVariants(args) => args.run(),
        Commands::ExtractBrassVcf(args) => args.run_vcf(sanger_tools::vcf::VcfSource::Brass),
        Commands::ExtractBrassBedpe(args) => args.run_bedpe(),
        Commands::ExtractCavemanVcf(args) => args.run_vcf(sanger_tools::vcf::VcfSource::Caveman),
        Commands::ExtractAscat(args) => args.run(),
        Commands::MarkdownHelp => Ok(()),
    }?;

    info!("Finished, took {:.2?}.", start.elapsed());
    Ok(())
}
