// main.rs - forge CLI and interactive compile REPL

use std::env;
use std::fs;
use std::path::Path;
use std::process;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use forge::bytecode_io;
use forge::compiler::{compile, compile_with_context, CompileOutput};
use forge::context::CompileContext;
use forge::disasm::disassemble;

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut dis_mode = false;
    let mut input: Option<String> = None;
    let mut output_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--dis" => dis_mode = true,
            "-o" => {
                i += 1;
                output_path = args.get(i).cloned();
            }
            "--help" | "-h" => {
                print_usage();
                return;
            }
            arg if !arg.starts_with('-') => {
                if input.is_none() {
                    input = Some(arg.to_string());
                }
            }
            other => {
                eprintln!("Unknown flag: {}", other);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    match input {
        Some(path) if dis_mode => disassemble_file(&path),
        Some(path) => compile_file(&path, output_path.as_deref()),
        None if dis_mode => {
            print_usage();
            process::exit(1);
        }
        None => repl(),
    }
}

fn print_usage() {
    println!("forge - Forth front-end compiler for the V4 stack VM");
    println!();
    println!("Usage:");
    println!("  forge                     Start interactive REPL");
    println!("  forge FILE                Compile a source file and show the bytecode");
    println!("  forge FILE -o OUT.v4b     Compile and save the main bytecode container");
    println!("  forge --dis FILE.v4b      Disassemble a bytecode container");
}

fn compile_file(path: &str, output_path: Option<&str>) {
    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", path, e);
            process::exit(1);
        }
    };

    let output = match compile(&source) {
        Ok(out) => out,
        Err(e) => {
            eprint!("{}", e.format());
            process::exit(1);
        }
    };

    print_output(&output);

    if let Some(out_path) = output_path {
        if let Err(e) = bytecode_io::save(&output, Path::new(out_path)) {
            eprintln!("Failed to save '{}': {}", out_path, e);
            process::exit(1);
        }
        println!("Saved main bytecode to {}", out_path);
    }
}

fn disassemble_file(path: &str) {
    match bytecode_io::load(Path::new(path)) {
        Ok(output) => {
            for line in disassemble(&output.code) {
                println!("{}", line);
            }
        }
        Err(e) => {
            eprintln!("Failed to load '{}': {}", path, e);
            process::exit(1);
        }
    }
}

fn print_output(output: &CompileOutput) {
    for (idx, word) in output.words.iter().enumerate() {
        println!("word #{} {} ({} bytes):", idx, word.name, word.code.len());
        for line in disassemble(&word.code) {
            println!("  {}", line);
        }
    }
    println!("main ({} bytes):", output.code.len());
    for line in disassemble(&output.code) {
        println!("  {}", line);
    }
}

fn repl() {
    println!("forge compile REPL");
    println!("Type .help for help, .quit to exit");
    println!();

    let mut ctx = CompileContext::new();
    let mut next_vm_idx: i32 = 0;
    let mut last_output: Option<CompileOutput> = None;

    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Failed to start line editor: {}", e);
            process::exit(1);
        }
    };
    let history_file = dirs::home_dir().map(|mut p| {
        p.push(".forge_history");
        p
    });
    if let Some(ref path) = history_file {
        let _ = rl.load_history(path);
    }

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);

                if let Some(cmd) = input.strip_prefix('.') {
                    let mut parts = cmd.split_whitespace();
                    match parts.next() {
                        Some("quit") | Some("q") | Some("exit") => break,
                        Some("help") | Some("h") => print_repl_help(),
                        Some("words") | Some("w") => {
                            if ctx.is_empty() {
                                println!("no words registered");
                            }
                            for i in 0..ctx.len() {
                                if let Some(name) = ctx.name(i) {
                                    println!("  @{} {}", ctx.find(name).unwrap_or(-1), name);
                                }
                            }
                        }
                        Some("reset") => {
                            ctx.reset();
                            next_vm_idx = 0;
                            last_output = None;
                            println!("context cleared");
                        }
                        Some("save") => match (parts.next(), &last_output) {
                            (Some(path), Some(output)) => {
                                match bytecode_io::save(output, Path::new(path)) {
                                    Ok(()) => println!("saved to {}", path),
                                    Err(e) => println!("save failed: {}", e),
                                }
                            }
                            (None, _) => println!("usage: .save FILE"),
                            (_, None) => println!("nothing compiled yet"),
                        },
                        _ => println!("unknown command: {} (try .help)", input),
                    }
                    continue;
                }

                match compile_with_context(Some(&ctx), input) {
                    Ok(output) => {
                        for word in &output.words {
                            ctx.register(&word.name, next_vm_idx);
                            println!("word @{} {} ({} bytes)", next_vm_idx, word.name, word.code.len());
                            next_vm_idx += 1;
                        }
                        for line in disassemble(&output.code) {
                            println!("{}", line);
                        }
                        last_output = Some(output);
                    }
                    Err(e) => print!("{}", e.format()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(ref path) = history_file {
        let _ = rl.save_history(path);
    }
}

fn print_repl_help() {
    println!("forge REPL commands:");
    println!("  .help, .h      Show this help");
    println!("  .words, .w     List words registered in the context");
    println!("  .save FILE     Save the last main bytecode as a container");
    println!("  .reset         Clear the context and word numbering");
    println!("  .quit, .q      Exit");
    println!();
    println!("Anything else is compiled as Forth source; new definitions are");
    println!("registered in the context so later lines can call them.");
}
