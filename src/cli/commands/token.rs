use clap::Args;
use serde_json::json;

use crate::auth::{generate_jwt, AccessScope, Claims};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::types::Role;

#[derive(Args)]
pub struct TokenArgs {
    #[arg(long, help = "Account id placed in the token")]
    pub user_id: i64,

    #[arg(long, help = "roo or school")]
    pub role: Role,

    #[arg(long, help = "School id, required for school accounts")]
    pub school_id: Option<i64>,

    #[arg(long, help = "Lifetime in hours (defaults to the configured expiry)")]
    pub expiry_hours: Option<u64>,
}

pub async fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config().security;
    if security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET is not set");
    }

    let claims = Claims::new(
        args.user_id,
        args.role,
        args.school_id,
        args.expiry_hours.unwrap_or(security.jwt_expiry_hours),
    );
    // same check the API applies to incoming tokens
    AccessScope::from_claims(&claims)?;

    let token = generate_jwt(&claims, &security.jwt_secret)?;

    match output_format {
        OutputFormat::Json => output_success(
            &output_format,
            "Token generated",
            Some(json!({ "token": token, "expires_at": claims.exp })),
        ),
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}
