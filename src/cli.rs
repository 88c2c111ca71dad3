//! Command-line surface
//!
//! The original utility accepted Windows-style slash flags; those are
//! normalized into the forms clap understands before parsing so both
//! `--nodarkmode` and `/nodarkmode` work.

use clap::error::ErrorKind;
use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(name = "hyperv-tray")]
#[command(about = "Manage Hyper-V virtual machines from the notification area", long_about = None)]
pub struct Cli {
    /// Do not enable dark mode for the context menu
    #[arg(long = "nodarkmode")]
    pub no_dark_mode: bool,
}

/// Map legacy slash-style flags onto their clap spellings, case-insensitively.
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|arg| match arg.to_ascii_lowercase().as_str() {
            "/?" | "-?" | "/h" | "/help" => "--help".to_string(),
            "/nodarkmode" => "--nodarkmode".to_string(),
            _ => arg,
        })
        .collect()
}

/// Parse the process arguments. Help exits 0; an unrecognized argument prints
/// an error and exits 1.
pub fn parse() -> Cli {
    match Cli::try_parse_from(normalize_args(std::env::args())) {
        Ok(cli) => cli,
        Err(error) => {
            let code = match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = error.print();
            std::process::exit(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_slash_help_forms_normalize() {
        for form in ["/?", "-?", "/h", "/help", "/HELP"] {
            let normalized = normalize_args(args(&["hyperv-tray", form]));
            assert_eq!(normalized[1], "--help", "form {form}");
        }
    }

    #[test]
    fn test_slash_nodarkmode_normalizes() {
        let normalized = normalize_args(args(&["hyperv-tray", "/NoDarkMode"]));
        assert_eq!(normalized[1], "--nodarkmode");
    }

    #[test]
    fn test_nodarkmode_flag_parses() {
        let cli = Cli::try_parse_from(args(&["hyperv-tray", "--nodarkmode"])).unwrap();
        assert!(cli.no_dark_mode);

        let cli = Cli::try_parse_from(args(&["hyperv-tray"])).unwrap();
        assert!(!cli.no_dark_mode);
    }

    #[test]
    fn test_unrecognized_flag_is_an_error() {
        let result = Cli::try_parse_from(args(&["hyperv-tray", "--frobnicate"]));
        assert!(result.is_err());
    }
}
