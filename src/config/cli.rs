use crate::config::descriptor::LocationSpec;
use crate::config::job::{JobConfig, JobMeta, SideConfig, TransferJob};
use crate::domain::model::Format;
use crate::utils::error::Result;
use clap::{Args, Parser};

#[derive(Debug, Clone, Default, Args)]
pub struct SourceArgs {
    #[arg(id = "source_bucket", long = "source-bucket")]
    pub bucket: Option<String>,

    #[arg(id = "source_file_name", long = "source-file")]
    pub file_name: Option<String>,

    #[arg(id = "source_format", long = "source-format", value_parser = parse_format)]
    pub format: Option<Format>,

    #[arg(id = "source_schema", long = "source-schema")]
    pub schema: Option<String>,

    #[arg(id = "source_table", long = "source-table")]
    pub table: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct TargetArgs {
    #[arg(id = "target_bucket", long = "target-bucket")]
    pub bucket: Option<String>,

    #[arg(id = "target_file_name", long = "target-file")]
    pub file_name: Option<String>,

    #[arg(id = "target_format", long = "target-format", value_parser = parse_format)]
    pub format: Option<Format>,

    #[arg(id = "target_schema", long = "target-schema")]
    pub schema: Option<String>,

    #[arg(id = "target_table", long = "target-table")]
    pub table: Option<String>,

    #[arg(long, help = "insert, upsert or truncate_insert")]
    pub transform: Option<String>,

    #[arg(long, value_delimiter = ',', help = "Key columns for upsert")]
    pub key_columns: Vec<String>,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "table-transfer")]
#[command(about = "Move tables between local files, object storage and PostgreSQL")]
pub struct CliConfig {
    #[arg(long, env = "TABLE_TRANSFER_JOB", help = "TOML job file; replaces the inline flags")]
    pub job: Option<String>,

    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub target: TargetArgs,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log as JSON lines")]
    pub log_json: bool,

    #[arg(long, help = "Log process memory/CPU after each phase")]
    pub monitor: bool,
}

fn parse_format(value: &str) -> std::result::Result<Format, String> {
    value.parse::<Format>().map_err(|e| e.to_string())
}

impl CliConfig {
    /// Builds the job from `--job` when given, otherwise from the inline flags.
    pub fn to_job(&self) -> Result<TransferJob> {
        if let Some(path) = &self.job {
            return JobConfig::from_file(path)?.into_job();
        }

        JobConfig {
            job: JobMeta {
                name: "cli".to_string(),
                description: None,
            },
            source: SideConfig {
                location: LocationSpec {
                    bucket: self.source.bucket.clone(),
                    file_name: self.source.file_name.clone(),
                    schema: self.source.schema.clone(),
                    table: self.source.table.clone(),
                },
                format: self.source.format,
                transform: None,
                key_columns: Vec::new(),
            },
            target: SideConfig {
                location: LocationSpec {
                    bucket: self.target.bucket.clone(),
                    file_name: self.target.file_name.clone(),
                    schema: self.target.schema.clone(),
                    table: self.target.table.clone(),
                },
                format: self.target.format,
                transform: self.target.transform.clone(),
                key_columns: self.target.key_columns.clone(),
            },
        }
        .into_job()
    }
}
