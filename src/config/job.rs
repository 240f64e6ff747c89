use crate::config::descriptor::{LocationSpec, TransferDescriptor};
use crate::config::secrets::Env;
use crate::domain::model::{Format, TransformPolicy};
use crate::utils::error::{Result, TransferError};
use crate::utils::validation::{
    validate_bucket_name, validate_identifier, validate_non_empty_string, validate_path, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One side of a job as written in a job file or assembled from CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideConfig {
    #[serde(flatten)]
    pub location: LocationSpec,
    pub format: Option<Format>,
    pub transform: Option<String>,
    #[serde(default)]
    pub key_columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMeta {
    pub name: String,
    pub description: Option<String>,
}

/// Job file layout:
///
/// ```toml
/// [job]
/// name = "people-to-warehouse"
///
/// [source]
/// bucket = "raw-data"
/// file_name = "people.csv"
/// format = "csv"
///
/// [target]
/// schema = "public"
/// table = "people"
/// transform = "upsert"
/// key_columns = ["id"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub job: JobMeta,
    pub source: SideConfig,
    pub target: SideConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStep {
    Blob { format: Format },
    Relational,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStep {
    Blob { format: Format },
    Relational { policy: TransformPolicy },
}

/// A fully resolved transfer: where from, where to, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub name: String,
    pub descriptor: TransferDescriptor,
    pub load: LoadStep,
    pub save: SaveStep,
}

fn has_table(location: &LocationSpec) -> bool {
    location.schema.is_some() || location.table.is_some()
}

impl JobConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file_with_env(path, &Env::process())
    }

    pub fn from_file_with_env<P: AsRef<Path>>(path: P, env: &Env) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            TransferError::configuration(format!(
                "cannot read job file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str_with_env(&content, env)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_toml_str_with_env(content, &Env::process())
    }

    pub fn from_toml_str_with_env(content: &str, env: &Env) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content, env)?;

        toml::from_str(&processed_content)
            .map_err(|e| TransferError::configuration(format!("TOML parsing error: {}", e)))
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as-is.
    fn substitute_env_vars(content: &str, env: &Env) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| TransferError::configuration(format!("bad substitution pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            env.get(var_name)
                .unwrap_or_else(|| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    fn load_step(&self) -> Result<LoadStep> {
        let source = &self.source;
        if source.transform.is_some() {
            return Err(TransferError::configuration(
                "transform applies to the target side only",
            ));
        }
        match source.format {
            Some(format) => Ok(LoadStep::Blob { format }),
            None if has_table(&source.location) => Ok(LoadStep::Relational),
            None => Err(TransferError::configuration(
                "source needs a format (csv/json) or a schema and table",
            )),
        }
    }

    fn save_step(&self) -> Result<SaveStep> {
        let target = &self.target;
        match (&target.transform, target.format) {
            (Some(_), Some(_)) => Err(TransferError::configuration(
                "target sets both format and transform; files take a format, tables a transform",
            )),
            (Some(transform), None) => Ok(SaveStep::Relational {
                policy: TransformPolicy::parse(transform, target.key_columns.clone())?,
            }),
            (None, Some(format)) => Ok(SaveStep::Blob { format }),
            (None, None) if has_table(&target.location) => Ok(SaveStep::Relational {
                policy: TransformPolicy::Insert,
            }),
            (None, None) => Err(TransferError::configuration(
                "target needs a format (csv/json) or a schema and table",
            )),
        }
    }

    pub fn into_job(self) -> Result<TransferJob> {
        self.validate()?;
        let load = self.load_step()?;
        let save = self.save_step()?;

        Ok(TransferJob {
            name: if self.job.name.is_empty() {
                "transfer".to_string()
            } else {
                self.job.name
            },
            descriptor: TransferDescriptor::new(self.source.location, self.target.location),
            load,
            save,
        })
    }
}

fn validate_location(prefix: &str, location: &LocationSpec) -> Result<()> {
    if let Some(bucket) = &location.bucket {
        validate_bucket_name(&format!("{}.bucket", prefix), bucket)?;
    }
    if let Some(file_name) = &location.file_name {
        validate_path(&format!("{}.file_name", prefix), file_name)?;
    }
    if let Some(schema) = &location.schema {
        validate_identifier(&format!("{}.schema", prefix), schema)?;
    }
    if let Some(table) = &location.table {
        validate_identifier(&format!("{}.table", prefix), table)?;
    }
    Ok(())
}

impl Validate for JobConfig {
    fn validate(&self) -> Result<()> {
        validate_location("source", &self.source.location)?;
        validate_location("target", &self.target.location)?;
        for key in &self.target.key_columns {
            validate_non_empty_string("target.key_columns", key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ErrorKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_object_to_table_job() {
        let toml_content = r#"
[job]
name = "people-upsert"

[source]
bucket = "raw-data"
file_name = "people.csv"
format = "csv"

[target]
schema = "public"
table = "people"
transform = "upsert"
key_columns = ["id"]
"#;

        let job = JobConfig::from_toml_str(toml_content)
            .unwrap()
            .into_job()
            .unwrap();

        assert_eq!(job.name, "people-upsert");
        assert_eq!(job.descriptor.source.bucket.as_deref(), Some("raw-data"));
        assert_eq!(
            job.load,
            LoadStep::Blob {
                format: Format::DelimitedText
            }
        );
        assert_eq!(
            job.save,
            SaveStep::Relational {
                policy: TransformPolicy::Upsert {
                    key_columns: vec!["id".to_string()]
                }
            }
        );
    }

    #[test]
    fn test_table_target_defaults_to_insert() {
        let toml_content = r#"
[source]
schema = "public"
table = "events"

[target]
schema = "archive"
table = "events"
"#;
        let job = JobConfig::from_toml_str(toml_content)
            .unwrap()
            .into_job()
            .unwrap();
        assert_eq!(job.load, LoadStep::Relational);
        assert_eq!(
            job.save,
            SaveStep::Relational {
                policy: TransformPolicy::Insert
            }
        );
    }

    #[test]
    fn test_env_var_substitution() {
        let env = Env::from_pairs([("TABLE_TRANSFER_TEST_BUCKET", "substituted-bucket")]);

        let toml_content = r#"
[source]
bucket = "${TABLE_TRANSFER_TEST_BUCKET}"
file_name = "in.json"
format = "json"

[target]
file_name = "out.csv"
format = "csv"
"#;

        let config = JobConfig::from_toml_str_with_env(toml_content, &env).unwrap();
        assert_eq!(
            config.source.location.bucket.as_deref(),
            Some("substituted-bucket")
        );
    }

    #[test]
    fn test_unknown_variable_is_left_in_place() {
        let env = Env::from_pairs(Vec::<(String, String)>::new());
        let config = JobConfig::from_toml_str_with_env(
            "[source]\nfile_name = \"${NOT_SET_ANYWHERE}.csv\"\nformat = \"csv\"\n[target]\nfile_name = \"b.csv\"\nformat = \"csv\"\n",
            &env,
        )
        .unwrap();
        assert_eq!(
            config.source.location.file_name.as_deref(),
            Some("${NOT_SET_ANYWHERE}.csv")
        );
    }

    #[test]
    fn test_format_names_are_case_insensitive() {
        let toml_content = r#"
[source]
file_name = "a.csv"
format = "CSV"

[target]
file_name = "b.json"
format = "Json"
"#;
        let job = JobConfig::from_toml_str(toml_content)
            .unwrap()
            .into_job()
            .unwrap();
        assert_eq!(
            job.load,
            LoadStep::Blob {
                format: Format::DelimitedText
            }
        );
        assert_eq!(
            job.save,
            SaveStep::Blob {
                format: Format::Document
            }
        );
    }

    #[test]
    fn test_unknown_format_in_job_is_configuration_error() {
        let err = JobConfig::from_toml_str(
            "[source]\nfile_name = \"a.csv\"\nformat = \"parquet\"\n[target]\nfile_name = \"b.csv\"\nformat = \"csv\"\n",
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_invalid_jobs_are_configuration_errors() {
        let cases = [
            // format and transform on the same target
            "[source]\nfile_name = \"a.csv\"\nformat = \"csv\"\n[target]\nfile_name = \"b.csv\"\nformat = \"csv\"\ntransform = \"insert\"\n",
            // unknown transform
            "[source]\nfile_name = \"a.csv\"\nformat = \"csv\"\n[target]\nschema = \"s\"\ntable = \"t\"\ntransform = \"merge\"\n",
            // source with nothing to read
            "[source]\nfile_name = \"a.csv\"\n[target]\nfile_name = \"b.csv\"\nformat = \"csv\"\n",
            // bucket name rules
            "[source]\nbucket = \"Bad_Bucket\"\nfile_name = \"a.csv\"\nformat = \"csv\"\n[target]\nfile_name = \"b.csv\"\nformat = \"csv\"\n",
        ];

        for case in cases {
            let err = JobConfig::from_toml_str(case)
                .and_then(JobConfig::into_job)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "case: {case}");
        }
    }

    #[test]
    fn test_job_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[source]\nfile_name = \"in.csv\"\nformat = \"csv\"\n[target]\nfile_name = \"out.json\"\nformat = \"json\"\n")
            .unwrap();

        let job = JobConfig::from_file(temp_file.path())
            .unwrap()
            .into_job()
            .unwrap();
        assert_eq!(job.name, "transfer");
        assert_eq!(
            job.save,
            SaveStep::Blob {
                format: Format::Document
            }
        );
    }
}
