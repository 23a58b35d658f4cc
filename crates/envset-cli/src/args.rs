//! Command-line definition and argument parsing

use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use envset_core::{EffectiveSetVersion, GenerationError, GeneratorConfig};

/// Extra parameter carrying the deployment session id
pub const DEPLOYMENT_SESSION_ID: &str = "DEPLOYMENT_SESSION_ID";

/// Build the `envset` command
#[must_use]
pub fn command() -> Command {
    Command::new("envset")
        .version(crate::VERSION)
        .about("Effective set generator for multi-tenant cloud environments")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("generate")
                .about("Generate the effective set of one environment")
                .arg(
                    Arg::new("inventory")
                        .long("inventory")
                        .short('i')
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Environment inventory document (YAML)"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory the effective set is written to"),
                )
                .arg(
                    Arg::new("env-id")
                        .long("env-id")
                        .help("Environment id used in mapping tables, defaults to the cloud name"),
                )
                .arg(
                    Arg::new("effective-set-version")
                        .long("effective-set-version")
                        .default_value("v2.0")
                        .help("Output layout version (v1.0 or v2.0)"),
                )
                .arg(
                    Arg::new("extra-params")
                        .long("extra-params")
                        .action(ArgAction::Append)
                        .value_name("KEY=VALUE")
                        .help("Pipeline parameters, e.g. DEPLOYMENT_SESSION_ID=<id>"),
                )
                .arg(
                    Arg::new("enable-traceability")
                        .long("enable-traceability")
                        .num_args(0..=1)
                        .default_value("false")
                        .default_missing_value("true")
                        .value_parser(value_parser!(bool))
                        .help("Annotate every written value with its origin"),
                )
                .arg(
                    Arg::new("workers")
                        .long("workers")
                        .value_parser(value_parser!(usize))
                        .help("Number of application workers, defaults to available cores"),
                ),
        )
}

/// Parsed `generate` arguments
#[derive(Debug, Clone)]
pub struct GenerateArgs {
    /// Inventory document
    pub inventory: PathBuf,
    /// Output root
    pub output: PathBuf,
    /// Generator configuration
    pub config: GeneratorConfig,
}

impl GenerateArgs {
    /// Read the `generate` subcommand matches.
    ///
    /// # Errors
    /// [`GenerationError::InvalidConfig`] for an unknown version or a
    /// malformed extra parameter.
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, GenerationError> {
        let inventory = required_path(matches, "inventory")?;
        let output = required_path(matches, "output")?;

        let version: EffectiveSetVersion = matches
            .get_one::<String>("effective-set-version")
            .map_or(Ok(EffectiveSetVersion::default()), |v| v.parse())?;

        let mut config = GeneratorConfig::new()
            .with_version(version)
            .with_traceability(
                matches
                    .get_one::<bool>("enable-traceability")
                    .copied()
                    .unwrap_or(false),
            );
        if let Some(workers) = matches.get_one::<usize>("workers") {
            config = config.with_worker_threads(*workers);
        }
        if let Some(env_id) = matches.get_one::<String>("env-id") {
            config = config.with_env_id(env_id.as_str());
        }

        let extra = matches
            .get_many::<String>("extra-params")
            .into_iter()
            .flatten();
        for raw in extra {
            let (key, value) = parse_extra_param(raw)?;
            if key == DEPLOYMENT_SESSION_ID {
                config = config.with_deployment_session_id(value);
            } else {
                tracing::debug!("ignoring extra parameter {}", key);
            }
        }

        Ok(Self {
            inventory,
            output,
            config,
        })
    }
}

fn required_path(matches: &ArgMatches, id: &str) -> Result<PathBuf, GenerationError> {
    matches
        .get_one::<PathBuf>(id)
        .cloned()
        .ok_or_else(|| GenerationError::InvalidConfig(format!("--{id} is required")))
}

/// Split `KEY=VALUE`; the value may itself contain `=`.
///
/// # Errors
/// [`GenerationError::InvalidConfig`] when there is no `=` or the key is empty.
pub fn parse_extra_param(raw: &str) -> Result<(&str, &str), GenerationError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(GenerationError::InvalidConfig(format!(
            "extra parameter '{raw}' is not in KEY=VALUE form"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<GenerateArgs, GenerationError> {
        let matches = command()
            .try_get_matches_from(args)
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        GenerateArgs::from_matches(sub)
    }

    #[test]
    fn defaults() {
        let args = parse(&["envset", "generate", "-i", "inv.yaml", "-o", "out"]).unwrap();
        assert_eq!(args.inventory, PathBuf::from("inv.yaml"));
        assert_eq!(args.config.effective_set_version, EffectiveSetVersion::V2_0);
        assert!(!args.config.enable_traceability);
        assert!(args.config.deployment_session_id.is_none());
    }

    #[test]
    fn full_invocation() {
        let args = parse(&[
            "envset",
            "generate",
            "--inventory",
            "inv.yaml",
            "--output",
            "out",
            "--env-id",
            "prod/env1",
            "--effective-set-version",
            "v1.0",
            "--extra-params",
            "DEPLOYMENT_SESSION_ID=abc-123",
            "--extra-params",
            "OTHER=x=y",
            "--enable-traceability",
            "--workers",
            "3",
        ])
        .unwrap();
        assert_eq!(args.config.effective_set_version, EffectiveSetVersion::V1_0);
        assert!(args.config.enable_traceability);
        assert_eq!(args.config.worker_threads, 3);
        assert_eq!(args.config.env_id.as_deref(), Some("prod/env1"));
        assert_eq!(args.config.deployment_session_id.as_deref(), Some("abc-123"));
    }

    #[test]
    fn explicit_false_traceability() {
        let args = parse(&[
            "envset",
            "generate",
            "-i",
            "inv.yaml",
            "-o",
            "out",
            "--enable-traceability",
            "false",
        ])
        .unwrap();
        assert!(!args.config.enable_traceability);
    }

    #[test]
    fn unknown_version_is_configuration_error() {
        let err = parse(&[
            "envset",
            "generate",
            "-i",
            "inv.yaml",
            "-o",
            "out",
            "--effective-set-version",
            "v3.0",
        ])
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn extra_param_forms() {
        assert_eq!(parse_extra_param("A=b=c").unwrap(), ("A", "b=c"));
        assert_eq!(parse_extra_param("A=").unwrap(), ("A", ""));
        assert!(parse_extra_param("novalue").is_err());
        assert!(parse_extra_param("=x").is_err());
    }
}
