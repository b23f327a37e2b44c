use fido_cli::input::Input;
use fido_cli::runner::{command, Runner};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("FIDO_LOG", "error,fido_core=info,fido_cli=info"))
        .init();

    let matches = command().get_matches();
    let input = Input::from_arguments(matches)?;
    let code = Runner::new(input).run()?;
    std::process::exit(code)
}
