use std::io::{self, BufRead, Write};

use dotenvy::dotenv;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use identity_flows::{IdentityClient, SigninEvent, SigninStrategy};

fn prompt(label: &str) -> io::Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=debug,identity_flows=debug", env!("CARGO_CRATE_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let client = IdentityClient::from_env(None)?;
    tracing::info!("Using identity backend {}", client.config().backend_api_url);
    let snapshot = client.ensure_initialized().await?;
    if let Some(signin) = snapshot.session.and_then(|s| s.active_signin) {
        println!("Already signed in as {}", signin.id);
        return Ok(());
    }

    let email = prompt("Email")?;
    let flow = client.signin_flow();
    let mut event = flow.submit(SigninStrategy::EmailOtp { email }).await?;

    loop {
        match &event {
            SigninEvent::Completed(session) => {
                let signin = session
                    .active_signin
                    .as_ref()
                    .map(|s| s.id.as_str())
                    .unwrap_or_default();
                println!("Signed in: {signin}");
                break;
            }
            SigninEvent::VerificationRequired { step, .. } => {
                let code = prompt(&format!("Code for {step} (empty to resend)"))?;
                if code.is_empty() {
                    if !flow.resend().await? {
                        println!("Wait {}s before resending", flow.resend_remaining().await);
                    }
                    continue;
                }
                event = match flow.submit_verification(&code).await {
                    Ok(next) => next,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };
            }
            SigninEvent::ProfileIncomplete(fields) => {
                println!("Profile incomplete, missing: {fields:?}");
                break;
            }
            other => {
                println!("Sign-in stopped: {other:?}");
                break;
            }
        }
    }

    Ok(())
}
