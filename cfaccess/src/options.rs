use clap::{ColorChoice, Parser, ValueEnum};

use crate::extract::DEFAULT_ANNOTATION_PREFIX;

#[derive(Parser, Debug, Clone)]
pub struct Options {
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    #[arg(long, global = true, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Name of the cluster that owns the applications. Only applications
    /// created under this name are ever modified or deleted.
    #[arg(short, long, global = true, env = "CAC_CLUSTER_NAME")]
    pub cluster_name: Option<String>,

    /// Zone to manage. The first zone is the default for objects that do not
    /// name one.
    #[arg(
        short,
        long = "zone-name",
        global = true,
        env = "CAC_ZONE_NAMES",
        value_delimiter = ','
    )]
    pub zone_names: Vec<String>,

    /// API token with Access edit permissions on the zones
    #[arg(long, global = true, env = "CF_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    #[arg(long, global = true, default_value = cfaccess_api::cloudflare::DEFAULT_BASE_URL)]
    pub api_url: String,

    #[arg(long, global = true, default_value = DEFAULT_ANNOTATION_PREFIX)]
    pub annotation_prefix: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Path of a JSON document with the source objects, or `-` for stdin.
#[derive(Parser, Debug, Clone)]
pub struct SourceArgs {
    #[arg(short, long, default_value = "-")]
    pub file: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser, Debug)]
    struct Wrapper {
        #[command(flatten)]
        options: Options,
    }

    #[test]
    fn test_zone_names_are_comma_delimited() {
        let w = Wrapper::try_parse_from([
            "cfaccess",
            "--cluster-name",
            "prod",
            "-z",
            "example.com,example.org",
            "--zone-name",
            "example.net",
        ])
        .unwrap();
        assert_eq!(
            w.options.zone_names,
            vec!["example.com", "example.org", "example.net"]
        );
        assert_eq!(w.options.cluster_name.as_deref(), Some("prod"));
        assert_eq!(w.options.log_format, LogFormat::Text);
        assert_eq!(w.options.annotation_prefix, "access.cloudflare.com/");
    }

    #[test]
    fn test_json_log_format() {
        let w = Wrapper::try_parse_from(["cfaccess", "--log-format", "json"]).unwrap();
        assert_eq!(w.options.log_format, LogFormat::Json);
    }
}
