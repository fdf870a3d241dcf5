//! Command line front end for the token service.
//!
//! Reads configuration from `--config <file>` or from `JWT_*` environment
//! variables and prints results as JSON on stdout.

use std::process::ExitCode;

use serde_json::{json, Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jwt_token::{EnvConfig, ErrorResponse, FileConfig, TokenError, TokenService, TokenType};

struct Options {
    config_path: Option<String>,
    token_type: TokenType,
    payload: Option<String>,
    positional: Vec<String>,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options {
        config_path: None,
        token_type: TokenType::Access,
        payload: None,
        positional: Vec::new(),
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                options.config_path = Some(args[i + 1].clone());
                i += 1;
            }
            "--payload" if i + 1 < args.len() => {
                options.payload = Some(args[i + 1].clone());
                i += 1;
            }
            "--refresh" => options.token_type = TokenType::Refresh,
            flag if flag.starts_with("--") => return Err(format!("unknown or incomplete option: {}", flag)),
            value => options.positional.push(value.to_string()),
        }
        i += 1;
    }

    Ok(options)
}

fn parse_object(raw: &str, what: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(format!("{} must be a JSON object", what)),
        Err(e) => Err(format!("invalid {} JSON: {}", what, e)),
    }
}

fn positional<'a>(options: &'a Options, index: usize, name: &str) -> Result<&'a str, String> {
    options
        .positional
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| format!("missing <{}> argument", name))
}

enum Failure {
    Usage(String),
    Token(TokenError),
}

impl From<TokenError> for Failure {
    fn from(err: TokenError) -> Self {
        Failure::Token(err)
    }
}

impl From<String> for Failure {
    fn from(msg: String) -> Self {
        Failure::Usage(msg)
    }
}

fn run(command: &str, options: &Options) -> Result<Value, Failure> {
    let service = match &options.config_path {
        Some(path) => TokenService::new(FileConfig::new(path)),
        None => TokenService::new(EnvConfig::new()),
    };

    let output = match command {
        "issue" => {
            let extend = parse_object(positional(options, 0, "extend-json")?, "extend")?;
            let payload = match &options.payload {
                Some(raw) => parse_object(raw, "payload")?,
                None => Map::new(),
            };
            json!(service.generate(&extend, &payload)?)
        }
        "verify" => {
            let token = positional(options, 0, "token")?;
            json!(service.verify(options.token_type, Some(token))?)
        }
        "refresh" => {
            let token = positional(options, 0, "token")?;
            json!(service.refresh(Some(token))?)
        }
        "claim" => {
            let key = positional(options, 0, "key")?;
            let token = positional(options, 1, "token")?;
            service.get_claim_value(key, options.token_type, Some(token))?
        }
        "ttl" => {
            let token = positional(options, 0, "token")?;
            json!({ "remaining_seconds": service.get_remaining_seconds(options.token_type, Some(token))? })
        }
        other => return Err(Failure::Usage(format!("unknown command: {}", other))),
    };

    Ok(output)
}

fn print_usage() {
    println!("jwtctl - issue, verify and refresh access/refresh JWT pairs");
    println!();
    println!("Usage:");
    println!("  jwtctl issue <extend-json> [--payload <json>]");
    println!("  jwtctl verify <token> [--refresh]");
    println!("  jwtctl refresh <token>");
    println!("  jwtctl claim <key> <token> [--refresh]");
    println!("  jwtctl ttl <token> [--refresh]");
    println!();
    println!("Options:");
    println!("  --config <path>          JSON configuration file (default: environment)");
    println!("  --refresh                Treat the token as a refresh token");
    println!("  --payload <json>         Extra top-level claims for issued tokens");
    println!();
    println!("Environment Variables:");
    println!("  JWT_ISS                  Token issuer");
    println!("  JWT_ALGORITHMS           HS256, HS384, HS512, RS256, RS384 or RS512 (default: HS256)");
    println!("  JWT_ACCESS_EXP           Access token lifetime in seconds (default: 7200)");
    println!("  JWT_REFRESH_EXP          Refresh token lifetime in seconds (default: 604800)");
    println!("  JWT_LEEWAY               Clock skew tolerance in seconds (default: 0)");
    println!("  JWT_REFRESH_DISABLE      Issue access tokens only");
    println!("  JWT_ACCESS_SECRET_KEY    HMAC secrets, or JWT_ACCESS_PRIVATE_KEY/JWT_ACCESS_PUBLIC_KEY");
    println!("  JWT_REFRESH_SECRET_KEY   and JWT_REFRESH_PRIVATE_KEY/JWT_REFRESH_PUBLIC_KEY for RSA");
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays machine readable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jwtctl=info,jwt_token=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || matches!(args[1].as_str(), "help" | "--help" | "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let options = match parse_args(&args[2..]) {
        Ok(options) => options,
        Err(msg) => {
            eprintln!("{}", msg);
            return ExitCode::from(2);
        }
    };

    match run(&args[1], &options) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(Failure::Usage(msg)) => {
            eprintln!("{}", msg);
            eprintln!("Run 'jwtctl help' for usage.");
            ExitCode::from(2)
        }
        Err(Failure::Token(err)) => {
            tracing::debug!("Command failed: {}", err);
            let response = ErrorResponse::from(err);
            eprintln!("{}", json!(response));
            ExitCode::FAILURE
        }
    }
}
