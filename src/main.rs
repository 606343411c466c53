use std::env;
use std::fs;
use std::process;

use tiny6502::{Target, generate_assembly};

fn main() {
  let args: Vec<String> = env::args().collect();
  let program = args.first().map(String::as_str).unwrap_or("tiny6502");

  let mut input = None;
  let mut output = None;
  let mut target = Target::Generic;

  let mut i = 1;
  while i < args.len() {
    match args[i].as_str() {
      "-o" | "--output" => {
        i += 1;
        match args.get(i) {
          Some(path) => output = Some(path.clone()),
          None => usage(program),
        }
      }
      "-t" | "--target" => {
        i += 1;
        match args.get(i).map(String::as_str) {
          Some("generic") => target = Target::Generic,
          Some("py65mon") => target = Target::Py65mon,
          Some(other) => {
            eprintln!("unknown target '{other}' (expected generic or py65mon)");
            process::exit(1);
          }
          None => usage(program),
        }
      }
      arg if !arg.starts_with('-') && input.is_none() => input = Some(arg.to_string()),
      _ => usage(program),
    }
    i += 1;
  }

  let Some(input) = input else {
    usage(program);
  };

  let source = match fs::read_to_string(&input) {
    Ok(source) => source,
    Err(err) => {
      eprintln!("Error reading {input}: {err}");
      process::exit(1);
    }
  };

  match generate_assembly(&source, target) {
    Ok(asm) => match output {
      Some(path) => {
        if let Err(err) = fs::write(&path, &asm) {
          eprintln!("Error writing {path}: {err}");
          process::exit(1);
        }
        println!("Compiled {input} -> {path}");
      }
      None => print!("{asm}"),
    },
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  }
}

fn usage(program: &str) -> ! {
  eprintln!("usage: {program} <input> [-o output.asm] [-t generic|py65mon]");
  process::exit(1);
}
