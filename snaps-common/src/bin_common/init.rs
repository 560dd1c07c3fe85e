use std::io::IsTerminal;
use std::path::Path;

use color_eyre::{
    config::{HookBuilder, Theme},
    eyre::{self, Context},
};
use fern_format::{Format, Stream};

/// Installs the eyre report hook, and a panic hook that both prints the panic and logs
/// it. Colors are only used on a terminal, never in the logs.
pub fn init_eyre() -> eyre::Result<()> {
    let theme = if std::io::stderr().is_terminal() {
        Theme::dark()
    } else {
        Theme::new()
    };

    let (panic_hook, eyre_hook) = HookBuilder::default().theme(theme).into_hooks();
    eyre_hook
        .install()
        .wrap_err("failed to install eyre hook")?;

    let (plain_panic_hook, _) = HookBuilder::default().theme(Theme::new()).into_hooks();
    std::panic::set_hook(Box::new(move |info| {
        eprintln!("{}", panic_hook.panic_report(info));
        log::error!(target: "panic", "{}", plain_panic_hook.panic_report(info));
    }));

    Ok(())
}

/// Logs `level` and up to stdout. If `logfile` is given, it gets debug messages as
/// well, no matter `level`.
pub fn init_logger(logfile: Option<&Path>, level: log::LevelFilter) -> eyre::Result<()> {
    let mut dispatch = fern::Dispatch::new().chain(console_dispatch(level));
    if let Some(logfile) = logfile {
        dispatch = dispatch.chain(logfile_dispatch(logfile)?);
    }

    dispatch.apply().wrap_err("failed to set the logger")?;
    Ok(())
}

fn console_dispatch(level: log::LevelFilter) -> fern::Dispatch {
    fern::Dispatch::new()
        .level(level)
        .format(
            Format::new()
                .color_if_supported(Stream::Stdout)
                .uniquely_color_threads()
                .callback(),
        )
        .chain(std::io::stdout())
}

fn logfile_dispatch(logfile: &Path) -> eyre::Result<fern::Dispatch> {
    let file = fern::log_file(logfile)
        .wrap_err_with(|| format!("failed to open the log file at: {logfile:?}"))?;

    Ok(fern::Dispatch::new()
        .level(log::LevelFilter::Debug)
        .format(Format::new().thread_names().callback())
        .chain(file))
}
