use std::io::Write;
use std::path::Path;

use mote_ir::{Limits, Unit};
use mote_runtime::{Runtime, Str, Value};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const USAGE: &str = "Usage: mote <run|eval|dump|compile> [--json] <args>
  run <file>             execute a script file
  eval <expr>            execute an inline expression
  dump <file>            print the compiled unit as text
  compile <file> <out>   write the compiled unit in binary form";

fn main() {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();
    let Some(cmd) = argv.first().cloned() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    argv.remove(0);

    let mut as_json = false;
    let mut positional: Vec<String> = Vec::new();
    for a in argv {
        if a == "--json" {
            as_json = true;
        } else {
            positional.push(a);
        }
    }

    match cmd.as_str() {
        "run" => {
            let Some(path) = positional.first() else {
                eprintln!("Missing <file>");
                std::process::exit(2);
            };
            let mut rt = new_runtime();
            let result = rt.exec_file(Path::new(path));
            finish(&mut rt, result, as_json);
        }
        "eval" => {
            let Some(expr) = positional.first() else {
                eprintln!("Missing <expr>");
                std::process::exit(2);
            };
            let mut rt = new_runtime();
            let result = rt.exec(expr);
            finish(&mut rt, result, as_json);
        }
        "dump" => {
            let Some(path) = positional.first() else {
                eprintln!("Missing <file>");
                std::process::exit(2);
            };
            let unit = compile_file(path);
            let mut out = std::io::stdout().lock();
            if let Err(e) = out.write_all(unit.dump_text().as_bytes()) {
                if e.kind() == std::io::ErrorKind::BrokenPipe {
                    return;
                }
                eprintln!("stdout error: {e}");
                std::process::exit(2);
            }
        }
        "compile" => {
            if positional.len() != 2 {
                eprintln!("Missing <file> <out>");
                std::process::exit(2);
            }
            let unit = compile_file(&positional[0]);
            if let Err(e) = std::fs::write(&positional[1], unit.to_bytes()) {
                eprintln!("cannot write {}: {e}", positional[1]);
                std::process::exit(2);
            }
        }
        _ => {
            eprintln!("Unknown command: {cmd}");
            std::process::exit(2);
        }
    }
}

fn new_runtime() -> Runtime {
    let mut rt = Runtime::new();
    let global = rt.global();
    rt.set_method(global, "print", print_native)
        .expect("register print");
    rt
}

fn print_native(rt: &mut Runtime, _this: Value, args: &[Value]) -> Result<Value, mote_runtime::Error> {
    let mut line = Str::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            line.push_str(" ");
        }
        rt.display_value(&mut line, *arg);
    }
    println!("{line}");
    Ok(Value::UNDEFINED)
}

fn compile_file(path: &str) -> Unit {
    let src = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cannot read {path}: {e}");
            std::process::exit(2);
        }
    };
    match mote_ir::compile(&src, &Limits::default()) {
        Ok(unit) => unit,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn finish(rt: &mut Runtime, result: Result<Value, mote_runtime::Error>, as_json: bool) {
    match result {
        Ok(v) => {
            if as_json {
                match rt.to_json_string(v) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("{}", rt.render_error(&e));
                        std::process::exit(1);
                    }
                }
            } else if !v.is_undefined() {
                let mut out = Str::new();
                rt.display_value(&mut out, v);
                println!("{out}");
            }
        }
        Err(e) => {
            eprintln!("{}", rt.render_error(&e));
            std::process::exit(1);
        }
    }
}
