//! Argument parsing, logging setup, and command dispatch.

use std::path::PathBuf;
use std::time::Duration;

use agrisight_client::config::{DEFAULT_API_URL, DEFAULT_MAX_RESENDS, DEFAULT_RESEND_COOLDOWN_SECS};
use agrisight_client::{AgriSight, ClientConfig};
use agrisight_telemetry::{CommandSpan, DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};
use clap::{Args, Parser, Subcommand, ValueEnum};
use url::Url;

use crate::client::{AppContext, CliError, CliResult, parse_url};
use crate::commands::{auth, email, models, password, predictions, profile, signup};

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    run_with(Cli::parse()).await
}

pub(crate) async fn run_with(cli: Cli) -> i32 {
    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format,
        build_sha: option_env!("AGRISIGHT_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: logging unavailable: {err}");
    }
    let _span = CommandSpan::enter(command_label(&cli.command));

    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            let exit_code = err.exit_code();
            tracing::debug!(exit_code, "command failed");
            eprintln!("error: {}", err.display_message());
            exit_code
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let config = cli.client_config();
    let app = AgriSight::connect(config).map_err(CliError::failure)?;
    let ctx = AppContext {
        app,
        output: cli.output,
    };

    match cli.command {
        Command::Signup(args) => signup::handle_signup(&ctx, args).await,
        Command::VerifySignup(args) => signup::handle_verify(&ctx, args).await,
        Command::ResendSignup => signup::handle_resend(&ctx).await,
        Command::CancelSignup => signup::handle_cancel(&ctx).await,
        Command::Login(args) => auth::handle_login(&ctx, args).await,
        Command::Logout => auth::handle_logout(&ctx).await,
        Command::Whoami => auth::handle_whoami(&ctx).await,
        Command::Password(command) => match command {
            PasswordCommand::Forgot(args) => password::handle_forgot(&ctx, args).await,
            PasswordCommand::Reset(args) => password::handle_reset(&ctx, args).await,
            PasswordCommand::Change(args) => password::handle_change(&ctx, args).await,
        },
        Command::Email(command) => match command {
            EmailCommand::Change(args) => email::handle_change(&ctx, args).await,
            EmailCommand::Verify(args) => email::handle_verify(&ctx, args).await,
            EmailCommand::Resend => email::handle_resend(&ctx).await,
            EmailCommand::Cancel => email::handle_cancel(&ctx).await,
        },
        Command::Profile(command) => match command {
            ProfileCommand::Show => profile::handle_show(&ctx).await,
            ProfileCommand::SetName(args) => profile::handle_set_name(&ctx, args).await,
            ProfileCommand::Avatar(args) => profile::handle_avatar(&ctx, args).await,
            ProfileCommand::FarmSize(args) => profile::handle_farm_size(&ctx, args).await,
            ProfileCommand::Delete(args) => profile::handle_delete(&ctx, args).await,
        },
        Command::Models(args) => models::handle_models(&ctx, args).await,
        Command::Predict(args) => predictions::handle_predict(&ctx, args).await,
        Command::History(args) => predictions::handle_history(&ctx, args).await,
        Command::Delete(args) => predictions::handle_delete(&ctx, args).await,
    }
}

#[derive(Parser)]
#[command(
    name = "agrisight",
    about = "Command-line client for the AgriSight crop disease service"
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "AGRISIGHT_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    pub(crate) api_url: Url,
    #[arg(
        long,
        global = true,
        env = "AGRISIGHT_MODEL_API_URL",
        value_parser = parse_url,
        help = "Model service base URL (defaults to --api-url)"
    )]
    pub(crate) model_api_url: Option<Url>,
    #[arg(
        long,
        global = true,
        env = "AGRISIGHT_HTTP_TIMEOUT_SECS",
        help = "Per-request timeout in seconds (transport default when unset)"
    )]
    pub(crate) timeout: Option<u64>,
    #[arg(
        long,
        global = true,
        env = "AGRISIGHT_STATE_DIR",
        help = "Directory holding session cookies and pending verification state"
    )]
    pub(crate) state_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "AGRISIGHT_SIGNUP_COOLDOWN_SECS",
        default_value_t = DEFAULT_RESEND_COOLDOWN_SECS
    )]
    pub(crate) signup_cooldown: u32,
    #[arg(
        long,
        global = true,
        env = "AGRISIGHT_EMAIL_CHANGE_COOLDOWN_SECS",
        default_value_t = DEFAULT_RESEND_COOLDOWN_SECS
    )]
    pub(crate) email_change_cooldown: u32,
    #[arg(
        long,
        global = true,
        env = "AGRISIGHT_MAX_RESENDS",
        default_value_t = DEFAULT_MAX_RESENDS
    )]
    pub(crate) max_resends: u32,
    #[arg(
        long,
        global = true,
        env = "AGRISIGHT_LOG_FORMAT",
        value_parser = parse_log_format,
        default_value = "auto"
    )]
    pub(crate) log_format: LogFormat,
    #[arg(
        long,
        global = true,
        env = "AGRISIGHT_LOG_LEVEL",
        default_value = DEFAULT_LOG_LEVEL
    )]
    pub(crate) log_level: String,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.api_url.clone());
        config.model_api_url.clone_from(&self.model_api_url);
        config.timeout = self.timeout.map(Duration::from_secs);
        config.signup_cooldown_secs = self.signup_cooldown;
        config.email_change_cooldown_secs = self.email_change_cooldown;
        config.max_resends = self.max_resends;
        config.state_dir = self.state_dir.clone().or_else(default_state_dir);
        config
    }
}

fn default_state_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".agrisight"))
}

fn parse_log_format(input: &str) -> Result<LogFormat, String> {
    input.parse().map_err(|err| format!("{err}"))
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Register a new account and send the verification code.
    Signup(SignupArgs),
    /// Verify the pending signup with the emailed code.
    VerifySignup(CodeArgs),
    /// Send a new signup code.
    ResendSignup,
    /// Abandon the pending signup.
    CancelSignup,
    /// Sign in.
    Login(LoginArgs),
    /// Sign out and forget stored credentials.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Password reset and change.
    #[command(subcommand)]
    Password(PasswordCommand),
    /// Change the account email address.
    #[command(subcommand)]
    Email(EmailCommand),
    /// Profile management.
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// List detection models.
    Models(ModelsArgs),
    /// Analyse an image with a detection model.
    Predict(PredictArgs),
    /// Browse prediction history.
    History(HistoryArgs),
    /// Delete a prediction.
    Delete(DeleteArgs),
}

#[derive(Subcommand)]
pub(crate) enum PasswordCommand {
    /// Email a password-reset token.
    Forgot(ForgotArgs),
    /// Set a new password with a reset token.
    Reset(ResetArgs),
    /// Change the password of the signed-in user.
    Change(ChangePasswordArgs),
}

#[derive(Subcommand)]
pub(crate) enum EmailCommand {
    /// Start an email change; a code is sent to the current address.
    Change(EmailChangeArgs),
    /// Confirm the pending email change with the emailed code.
    Verify(CodeArgs),
    /// Send a new email-change code.
    Resend,
    /// Abandon the pending email change.
    Cancel,
}

#[derive(Subcommand)]
pub(crate) enum ProfileCommand {
    /// Show profile details.
    Show,
    /// Update first and/or last name.
    SetName(SetNameArgs),
    /// Upload a new profile picture.
    Avatar(FileArgs),
    /// Update the declared farm size.
    FarmSize(FarmSizeArgs),
    /// Permanently delete the account.
    Delete(DeleteAccountArgs),
}

#[derive(Args)]
pub(crate) struct SignupArgs {
    #[arg(long)]
    pub(crate) email: String,
    #[arg(long)]
    pub(crate) first_name: String,
    #[arg(long)]
    pub(crate) last_name: String,
    #[arg(long, env = "AGRISIGHT_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
}

#[derive(Args)]
pub(crate) struct CodeArgs {
    #[arg(long, help = "Six-digit code; non-digits are ignored")]
    pub(crate) code: String,
}

#[derive(Args)]
pub(crate) struct LoginArgs {
    #[arg(long)]
    pub(crate) email: String,
    #[arg(long, env = "AGRISIGHT_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
}

#[derive(Args)]
pub(crate) struct ForgotArgs {
    #[arg(long)]
    pub(crate) email: String,
}

#[derive(Args)]
pub(crate) struct ResetArgs {
    #[arg(long, help = "Token from the reset email")]
    pub(crate) token: String,
    #[arg(long, env = "AGRISIGHT_NEW_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
}

#[derive(Args)]
pub(crate) struct ChangePasswordArgs {
    #[arg(long, env = "AGRISIGHT_PASSWORD", hide_env_values = true)]
    pub(crate) current: Option<String>,
    #[arg(long, env = "AGRISIGHT_NEW_PASSWORD", hide_env_values = true)]
    pub(crate) new: Option<String>,
}

#[derive(Args)]
pub(crate) struct EmailChangeArgs {
    #[arg(long)]
    pub(crate) new_email: String,
    #[arg(long, env = "AGRISIGHT_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
}

#[derive(Args)]
pub(crate) struct SetNameArgs {
    #[arg(long)]
    pub(crate) first_name: Option<String>,
    #[arg(long)]
    pub(crate) last_name: Option<String>,
}

#[derive(Args)]
pub(crate) struct FileArgs {
    #[arg(help = "Path to a JPEG, PNG or WebP image")]
    pub(crate) file: PathBuf,
}

#[derive(Args)]
pub(crate) struct FarmSizeArgs {
    #[arg(help = "Farm size as shown on the profile, e.g. 12 or 12 ha")]
    pub(crate) size: String,
}

#[derive(Args)]
pub(crate) struct DeleteAccountArgs {
    #[arg(long, help = "Type DELETE to confirm")]
    pub(crate) confirm: String,
    #[arg(long, env = "AGRISIGHT_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
}

#[derive(Args, Default)]
pub(crate) struct ModelsArgs {
    #[arg(long)]
    pub(crate) status: Option<String>,
    #[arg(long)]
    pub(crate) model_type: Option<String>,
}

#[derive(Args)]
pub(crate) struct PredictArgs {
    #[arg(long, help = "Model name as listed by `agrisight models`")]
    pub(crate) model: String,
    #[arg(help = "Path to a JPEG, PNG or WebP image")]
    pub(crate) file: PathBuf,
}

#[derive(Args)]
pub(crate) struct HistoryArgs {
    #[arg(long, default_value_t = 1)]
    pub(crate) page: u32,
    #[arg(long, default_value_t = 5)]
    pub(crate) per_page: u32,
    #[arg(long, help = "Filter by crop or disease label")]
    pub(crate) search: Option<String>,
}

#[derive(Args)]
pub(crate) struct DeleteArgs {
    #[arg(help = "Prediction identifier")]
    pub(crate) id: String,
    #[arg(long, default_value_t = 1, help = "History page to refresh on failure")]
    pub(crate) page: u32,
    #[arg(long, default_value_t = 5)]
    pub(crate) per_page: u32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Signup(_) => "signup",
        Command::VerifySignup(_) => "verify_signup",
        Command::ResendSignup => "resend_signup",
        Command::CancelSignup => "cancel_signup",
        Command::Login(_) => "login",
        Command::Logout => "logout",
        Command::Whoami => "whoami",
        Command::Password(PasswordCommand::Forgot(_)) => "password_forgot",
        Command::Password(PasswordCommand::Reset(_)) => "password_reset",
        Command::Password(PasswordCommand::Change(_)) => "password_change",
        Command::Email(EmailCommand::Change(_)) => "email_change",
        Command::Email(EmailCommand::Verify(_)) => "email_verify",
        Command::Email(EmailCommand::Resend) => "email_resend",
        Command::Email(EmailCommand::Cancel) => "email_cancel",
        Command::Profile(ProfileCommand::Show) => "profile_show",
        Command::Profile(ProfileCommand::SetName(_)) => "profile_set_name",
        Command::Profile(ProfileCommand::Avatar(_)) => "profile_avatar",
        Command::Profile(ProfileCommand::FarmSize(_)) => "profile_farm_size",
        Command::Profile(ProfileCommand::Delete(_)) => "profile_delete",
        Command::Models(_) => "models",
        Command::Predict(_) => "predict",
        Command::History(_) => "history",
        Command::Delete(_) => "delete",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("agrisight").chain(args.iter().copied()))
            .expect("arguments parse")
    }

    #[test]
    fn global_flags_build_client_config() {
        let cli = parse(&[
            "--api-url",
            "https://api.agrisight.test",
            "--model-api-url",
            "https://models.agrisight.test",
            "--timeout",
            "15",
            "--state-dir",
            "/tmp/agrisight-state",
            "--max-resends",
            "3",
            "history",
            "--page",
            "2",
        ]);
        let config = cli.client_config();

        assert_eq!(config.api_url.as_str(), "https://api.agrisight.test/");
        assert_eq!(
            config.model_base().as_str(),
            "https://models.agrisight.test/"
        );
        assert_eq!(config.timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.max_resends, 3);
        assert_eq!(
            config.state_dir.as_deref(),
            Some(std::path::Path::new("/tmp/agrisight-state"))
        );
        assert!(matches!(cli.command, Command::History(HistoryArgs { page: 2, .. })));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn defaults_match_client_defaults() {
        let cli = parse(&["--api-url", DEFAULT_API_URL, "whoami"]);
        let config = cli.client_config();
        assert_eq!(config.signup_cooldown_secs, DEFAULT_RESEND_COOLDOWN_SECS);
        assert_eq!(config.email_change_cooldown_secs, DEFAULT_RESEND_COOLDOWN_SECS);
        assert_eq!(config.max_resends, DEFAULT_MAX_RESENDS);
        assert!(config.timeout.is_none());
        assert_eq!(cli.output, OutputFormat::Table);
    }

    #[test]
    fn invalid_url_and_log_format_are_rejected() {
        assert!(Cli::try_parse_from(["agrisight", "--api-url", "not a url", "whoami"]).is_err());
        assert!(Cli::try_parse_from(["agrisight", "--log-format", "xml", "whoami"]).is_err());
    }

    #[test]
    fn command_label_matches_variants() {
        assert_eq!(command_label(&Command::Logout), "logout");
        assert_eq!(
            command_label(&Command::Email(EmailCommand::Resend)),
            "email_resend"
        );
        assert_eq!(
            command_label(&Command::Profile(ProfileCommand::Show)),
            "profile_show"
        );
    }
}
