use log::{error, info, warn, LevelFilter};
use shaderlab::config::CompilerConfig;
use shaderlab::include::{Builtins, Chain, IncludeProvider};
use shaderlab::{compile, logger, Context, Target};
use std::borrow::Cow;
use std::error::Error;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "shaderlab", about = "Compile a shader description into GLSL ES sources.")]
struct Opt {
  /// Shader file to compile.
  #[structopt(parse(from_os_str))]
  input: PathBuf,

  /// Target dialect: es100 or es300. Overrides the configuration file.
  #[structopt(short = "t", long = "target")]
  target: Option<Target>,

  /// Directory to look included fragments up in. Can be given several times; directories are
  /// searched in order, after the one of the input file and before the built-in library.
  #[structopt(short = "I", long = "include-dir", parse(from_os_str))]
  include_dirs: Vec<PathBuf>,

  /// JSON configuration file.
  #[structopt(short = "c", long = "config", parse(from_os_str))]
  config: Option<PathBuf>,

  /// Write the result there instead of stdout.
  #[structopt(short = "o", long = "output", parse(from_os_str))]
  output: Option<PathBuf>,

  /// More logs; repeat for even more.
  #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
  verbose: u8
}

/// Fragments looked up in a list of directories.
struct DirProvider {
  dirs: Vec<PathBuf>
}

impl IncludeProvider for DirProvider {
  fn resolve(&self, path: &str) -> Option<Cow<'_, str>> {
    for dir in &self.dirs {
      let full = dir.join(path);

      match fs::read_to_string(&full) {
        Ok(text) => return Some(Cow::Owned(text)),
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => (),
        Err(e) => {
          warn!("cannot read {}: {}", full.display(), e);
          return None;
        }
      }
    }

    None
  }
}

fn run(opt: Opt) -> Result<(), Box<dyn Error>> {
  let mut config = match opt.config {
    Some(ref path) => CompilerConfig::from_json(&fs::read_to_string(path)?)?,
    None => CompilerConfig::default()
  };

  if let Some(target) = opt.target {
    config.target = target;
  }

  let source = fs::read_to_string(&opt.input)?;

  let mut dirs: Vec<PathBuf> = opt.input.parent().map(|dir| dir.to_owned()).into_iter().collect();
  dirs.extend(opt.include_dirs);

  let provider = Chain(DirProvider { dirs }, Builtins);
  let ctx = Context::from_config(provider, &config).with_file_name(opt.input.display().to_string());
  let compiled = compile(&source, &ctx)?;
  let json = serde_json::to_string_pretty(&compiled)?;

  match opt.output {
    Some(ref path) => {
      fs::write(path, json)?;
      info!("wrote {}", path.display());
    }

    None => println!("{}", json)
  }

  Ok(())
}

fn main() {
  let opt = Opt::from_args();
  let level = match opt.verbose {
    0 => LevelFilter::Warn,
    1 => LevelFilter::Info,
    _ => LevelFilter::Debug
  };

  if let Err(e) = logger::init(level) {
    eprintln!("cannot install the logger: {}", e);
  }

  if let Err(e) = run(opt) {
    error!("{}", e);
    process::exit(1);
  }
}
