use anyhow::{bail, Context, Result};
use std::{
    env, fs,
    io::{self, Read, Write},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use ext_eval_in_browser::command::CMD_EVAL;
use ext_eval_in_browser::popup::SurfaceFactory;
use ext_eval_in_browser::{
    channel, register_commands, BufferEditor, CommandTable, Editor, EditorHost, EvalChannel,
    EvalCommand, EvalConfig, EvalMode, LiveStatus, Presentation, PopupSurface,
};

fn usage() {
    eprintln!("eval-in-browser [options] [-e <expr> | --file <path>]");
    eprintln!();
    eprintln!("Evaluates JavaScript in a browser tab exposing the DevTools protocol");
    eprintln!("(e.g. chrome --remote-debugging-port=9222). Reads stdin when no");
    eprintln!("expression or file is given.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <file>        Config file (default: ./eval-in-browser.toml)");
    eprintln!("  --endpoint <target>    Port, host:port or ws:// debugger URL");
    eprintln!("  --target <substring>   Pick the tab whose URL contains this");
    eprintln!("  --mode <remote|preview> Where the result gets formatted");
    eprintln!("  --show-undefined       Print results that are undefined");
    eprintln!("  -e <expr>              Evaluate this expression");
    eprintln!("  --file <path>          Evaluate the contents of this file");
    eprintln!("  -h, --help             Show this help");
    eprintln!();
    eprintln!("Logging: EVAL_IN_BROWSER_LOG=debug");
}

#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    endpoint: Option<String>,
    target: Option<String>,
    mode: Option<EvalMode>,
    show_undefined: bool,
    expr: Option<String>,
    file: Option<PathBuf>,
    help: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    while let Some(a) = args.next() {
        match a.as_str() {
            "--config" => {
                parsed.config = Some(PathBuf::from(
                    args.next().context("--config requires a path")?,
                ));
            }
            "--endpoint" => {
                parsed.endpoint = Some(args.next().context("--endpoint requires a value")?);
            }
            "--target" => {
                parsed.target = Some(args.next().context("--target requires a value")?);
            }
            "--mode" => {
                let raw = args.next().context("--mode requires a value")?;
                parsed.mode = Some(raw.parse::<EvalMode>()?);
            }
            "--show-undefined" => {
                parsed.show_undefined = true;
            }
            "-e" | "--eval" => {
                parsed.expr = Some(args.next().context("-e requires an expression")?);
            }
            "--file" => {
                parsed.file = Some(PathBuf::from(args.next().context("--file requires a path")?));
            }
            "-h" | "--help" => {
                parsed.help = true;
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    if parsed.expr.is_some() && parsed.file.is_some() {
        bail!("-e and --file are mutually exclusive");
    }
    Ok(parsed)
}

/// Terminal stand-in for the popup
#[derive(Default)]
struct TerminalSurface {
    content: String,
    visible: bool,
}

impl PopupSurface for TerminalSurface {
    fn set_content(&mut self, presentation: &Presentation) {
        self.content = presentation.to_ansi();
    }

    fn show(&mut self) {
        self.visible = true;
    }

    fn move_to(&mut self, left: f64, _top: f64) {
        if !self.visible {
            return;
        }
        let indent = " ".repeat(left.max(0.0) as usize);
        let mut out = io::stdout().lock();
        for line in self.content.lines() {
            let _ = writeln!(out, "{indent}{line}");
        }
        let _ = out.flush();
    }

    fn begin_fade_out(&mut self, duration: Duration) {
        tracing::trace!("Fading out over {:?}", duration);
    }

    fn finish_animation(&mut self) {}

    fn hide(&mut self) {
        self.visible = false;
    }
}

/// One buffer, always focused, session always live
struct CliHost {
    editor: Arc<BufferEditor>,
}

impl EditorHost for CliHost {
    fn focused_editor(&self) -> Option<Arc<dyn Editor>> {
        Some(self.editor.clone() as Arc<dyn Editor>)
    }

    fn live_status(&self) -> LiveStatus {
        LiveStatus::Active
    }
}

fn read_source(args: &Args) -> Result<String> {
    if let Some(expr) = &args.expr {
        return Ok(expr.clone());
    }
    if let Some(path) = &args.file {
        return fs::read_to_string(path).with_context(|| format!("reading {}", path.display()));
    }
    let mut source = String::new();
    io::stdin()
        .read_to_string(&mut source)
        .context("reading stdin")?;
    Ok(source)
}

fn load_config(args: &Args) -> Result<EvalConfig> {
    let cwd = env::current_dir().context("resolving working directory")?;
    let mut config = EvalConfig::load_or_default(args.config.as_deref(), &cwd)?;

    if let Some(endpoint) = &args.endpoint {
        config.inspector.endpoint = Some(endpoint.clone());
    }
    if let Some(target) = &args.target {
        config.inspector.target_url = Some(target.clone());
    }
    if let Some(mode) = args.mode {
        config.eval.mode = mode;
    }
    if args.show_undefined {
        config.eval.show_undefined = true;
    }
    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let source = read_source(&args)?;
    if source.trim().is_empty() {
        bail!("nothing to evaluate");
    }

    let client = Arc::new(
        channel::connect(&config.inspector)
            .await
            .context("connecting to the browser")?,
    );
    tracing::info!("Connected to {}", client.url());

    let host = Arc::new(CliHost {
        editor: Arc::new(
            BufferEditor::new(&source, config.eval.language.clone()).with_metrics(1.0, 1.0),
        ),
    });
    let surface: SurfaceFactory =
        Arc::new(|| Box::new(TerminalSurface::default()) as Box<dyn PopupSurface>);
    let command = Arc::new(EvalCommand::new(
        &config,
        host,
        client.clone() as Arc<dyn EvalChannel>,
        surface,
    ));

    let mut table = CommandTable::new();
    register_commands(&mut table, command.clone(), &config.command.shortcut)?;
    if let Some(spec) = table.spec(CMD_EVAL) {
        tracing::debug!("{} bound to {:?}", spec.label, spec.shortcut);
    }

    match command.handle() {
        Some(task) => task.await.context("evaluation task failed")?,
        None => bail!("evaluation was not dispatched"),
    }

    client.close().await;
    Ok(())
}

fn main() -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("EVAL_IN_BROWSER_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = parse_args(env::args().skip(1))?;
    if args.help {
        usage();
        return Ok(());
    }

    rt.block_on(run(args))
}
