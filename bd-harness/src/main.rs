use bd_crypto::errors::SessionFailure;
use bd_crypto::keypair::{OsRandomSource, RandomSource};
use bd_crypto::preset::{MODP_2048_256, TOY_GROUP_1019};
use bd_crypto::session::Session;
use bd_crypto::session::actor::run_actors;
use bd_crypto::{GroupParameters, Round, SessionConfig, SessionKey};

use clap::Parser;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Runs one Burmester–Desmedt session and reports whether every member agreed.
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct Args {
    /// Number of ring members.
    #[clap(short, long, default_value_t = 4)]
    participants: usize,
    /// Miller–Rabin rounds used to validate p and q.
    #[clap(short, long, default_value_t = 3)]
    iterations: u32,
    /// One thread per participant, exchanging JSON messages over in-process channels.
    #[clap(long)]
    actors: bool,
    /// Upper bound on waiting for a round, in milliseconds.
    #[clap(long, default_value_t = 5_000)]
    timeout_ms: u64,
    /// Use the 1019-element test group instead of RFC 5114 2048/256.
    #[clap(long)]
    toy: bool,
}

impl Args {
    fn params(&self) -> Arc<GroupParameters> {
        if self.toy {
            Arc::new(TOY_GROUP_1019.clone())
        } else {
            Arc::new(MODP_2048_256.clone())
        }
    }

    fn exec(self) -> Result<SessionKey, SessionFailure> {
        let config = SessionConfig::try_with(
            self.participants,
            self.iterations,
            Duration::from_millis(self.timeout_ms),
        )
        .map_err(|error| SessionFailure::new(Round::ParameterValidation, error))?;

        let params = self.params();
        let source: Arc<dyn RandomSource> = Arc::new(OsRandomSource);

        info!(
            participants = config.participants,
            actors = self.actors,
            modulus_bits = params.p().bits(),
            "starting session"
        );

        if self.actors {
            run_actors(params, &config, source)
        } else {
            Session::new(params, config).run(source)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let started = Instant::now();
    let result = args.exec();

    println!("Complete duration: {}ms", started.elapsed().as_millis());

    match result {
        Ok(key) => {
            println!("All session keys equal: true");
            println!("Session key length: {} bytes", key.to_bytes_be().len());
            ExitCode::SUCCESS
        }
        Err(failure) => {
            println!("All session keys equal: false");
            error!(
                round = %failure.round,
                retryable = failure.is_retryable(),
                security_incident = failure.is_security_incident(),
                "{}",
                failure
            );
            ExitCode::FAILURE
        }
    }
}
