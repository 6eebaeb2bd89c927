use std::io;
use std::process::ExitCode;

use shellgate::audit;
use shellgate::{AppResult, Config, ExecLauncher, Gateway, GitlabApiClient, Identity, Invocation};

fn run(who: &str) -> AppResult<bool> {
    let identity: Identity = who.parse()?;
    let config = Config::load()?;

    // Keep going without logs rather than refusing the session
    if let Err(e) = audit::init(&config) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let api = GitlabApiClient::from_config(&config)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let invocation = Invocation::from_env(identity);
    let gateway = Gateway::new(config, Box::new(api), Box::new(ExecLauncher));

    let mut input = io::stdin().lock();
    let mut out = io::stdout().lock();
    let mut err_out = io::stderr().lock();

    Ok(runtime.block_on(gateway.run(&invocation, &mut input, &mut out, &mut err_out)))
}

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let (Some(who), None) = (args.next(), args.next()) else {
        eprintln!("Usage: shellgate <key-ID|user-ID|username-NAME>");
        return ExitCode::FAILURE;
    };

    match run(&who) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
