//! Output renderers and formatting helpers for CLI commands.

use agrisight_client::FlowReport;
use agrisight_client::models::{DetectionModel, UserProfile};
use agrisight_core::otp::format_countdown;
use agrisight_core::{OtpNotice, OtpPurpose, Prediction, Route};
use anyhow::anyhow;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_profile(profile: &UserProfile, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(profile)?,
        OutputFormat::Table => {
            println!("id: {}", profile.id);
            println!("email: {}", profile.email.as_deref().unwrap_or("-"));
            let name = profile.display_name();
            println!("name: {}", if name.is_empty() { "-" } else { &name });
            println!("farm size: {}", profile.farm_size.as_deref().unwrap_or("-"));
            if let Some(url) = &profile.profile_pic_url {
                println!("avatar: {url}");
            }
        }
    }
    Ok(())
}

pub(crate) fn render_predictions(items: &[&Prediction], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(items)?,
        OutputFormat::Table => {
            if items.is_empty() {
                println!("no predictions");
                return Ok(());
            }
            println!(
                "{:<26} {:<16} {:<24} {:>5} DATE",
                "ID", "CROP", "DISEASE", "CONF"
            );
            for prediction in items {
                println!(
                    "{:<26} {:<16} {:<24} {:>4}% {}",
                    prediction.prediction_id,
                    truncate(&prediction.crop, 16),
                    truncate(&prediction.disease, 24),
                    prediction.confidence_percent(),
                    prediction.created_at.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn render_prediction(prediction: &Prediction, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(prediction)?,
        OutputFormat::Table => {
            println!("id: {}", prediction.prediction_id);
            println!("crop: {}", prediction.crop);
            println!("disease: {}", prediction.disease);
            println!("confidence: {}%", prediction.confidence_percent());
            if let Some(model) = &prediction.model_name {
                println!("model: {model}");
            }
            if let Some(url) = &prediction.image_url {
                println!("image: {url}");
            }
        }
    }
    Ok(())
}

pub(crate) fn render_models(models: &[DetectionModel], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(models)?,
        OutputFormat::Table => {
            println!("{:<24} {:<12} {:<14} DISPLAY NAME", "NAME", "STATUS", "TYPE");
            for model in models {
                println!(
                    "{:<24} {:<12} {:<14} {}",
                    model.name,
                    model.status.as_deref().unwrap_or("-"),
                    model.model_type.as_deref().unwrap_or("-"),
                    model.display_name.as_deref().unwrap_or(&model.name)
                );
            }
        }
    }
    Ok(())
}

/// Print the notices of a flow step; failures become a validation error.
pub(crate) fn render_report(report: &FlowReport) -> CliResult<()> {
    let mut failures = Vec::new();
    for notice in &report.notices {
        let message = notice_message(notice);
        if is_failure(notice) {
            failures.push(message);
        } else {
            println!("{message}");
        }
    }
    if let Some(route) = report.navigate {
        println!("next: {}", next_step(route));
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(CliError::validation(failures.join("; ")))
    }
}

#[must_use]
pub(crate) fn notice_message(notice: &OtpNotice) -> String {
    match notice {
        OtpNotice::CodeSent { email } => format!("verification code sent to {email}"),
        OtpNotice::CodeResent { resends_left } => {
            format!("a new code was sent ({resends_left} resends left)")
        }
        OtpNotice::Verified(OtpPurpose::Signup) => {
            "email verified; you can now sign in".to_string()
        }
        OtpNotice::Verified(OtpPurpose::EmailChange) => "email address updated".to_string(),
        OtpNotice::InvalidCode(message)
        | OtpNotice::RequestFailed(message)
        | OtpNotice::ResendFailed(message) => message.clone(),
        OtpNotice::ResendBlocked { remaining_secs } => format!(
            "you can request a new code in {}",
            format_countdown(*remaining_secs)
        ),
        OtpNotice::LimitReached => {
            "too many codes requested; please start again".to_string()
        }
        OtpNotice::Expired => "the verification code expired; please start again".to_string(),
        OtpNotice::Cancelled => "verification cancelled".to_string(),
    }
}

const fn is_failure(notice: &OtpNotice) -> bool {
    matches!(
        notice,
        OtpNotice::InvalidCode(_)
            | OtpNotice::RequestFailed(_)
            | OtpNotice::ResendFailed(_)
            | OtpNotice::ResendBlocked { .. }
            | OtpNotice::LimitReached
            | OtpNotice::Expired
    )
}

#[must_use]
pub(crate) const fn next_step(route: Route) -> &'static str {
    match route {
        Route::Login => "agrisight login --email <address>",
        Route::Signup => {
            "agrisight signup --email <address> --first-name <name> --last-name <name>"
        }
        Route::VerifySignup => "agrisight verify-signup --code <code>",
        Route::Profile => "agrisight profile show",
        Route::VerifyEmailChange => "agrisight email verify --code <code>",
        Route::History => "agrisight history",
        Route::Upload => "agrisight predict --model <name> <image>",
        Route::ForgotPassword => "agrisight password forgot --email <address>",
        Route::ResetPassword => "agrisight password reset --token <token>",
        Route::Home | Route::NotFound => "agrisight --help",
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{kept}…")
}
