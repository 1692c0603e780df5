use std::io::{self, Write};
use std::{env, fs, path::Path};

use tracing::Level;

use tapec::codegen::writer::CodegenConfig;
use tapec::frontend::lexer::Lexer;
use tapec::frontend::token_dumper::TokenDumper;
use tapec::ir::disasm::{print_lowered, print_program, print_stats};
use tapec::ir::program::ProgramIr;
use tapec::runtime::tape_dump::TapeDump;
use tapec::runtime::tape_vm::{EofBehavior, StepResult, TapeVm, TapeVmConfig};
use tapec::{compile_to_ir, generate, lower, parse};

/// Flags that take a value; their value is never the input file.
const VALUE_FLAGS: [&str; 5] = ["--emit-ir", "-o", "--tape-len", "--max-steps", "--eof"];

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() == 1 || has(&args, "--help") || has(&args, "-h") {
        print_usage();
        return;
    }

    init_logging(has(&args, "--verbose"), has(&args, "--trace"));

    let Some(filename) = input_file(&args) else {
        print_usage();
        std::process::exit(1);
    };

    let from_ir = has(&args, "--from-ir");
    let bf = has(&args, "--bf");
    if !from_ir && !bf {
        ensure_extension(filename);
    }

    if has(&args, "--tokens") {
        let source = read_text(filename);
        dump_tokens(&source, has(&args, "--no-color"), has(&args, "--pretty"));
        return;
    }

    if has(&args, "--ast") {
        let source = read_text(filename);
        let program = parse(&source).unwrap_or_else(|e| fail(e));
        println!("{:#?}", program);
        return;
    }

    let codegen = CodegenConfig {
        debug_info: has(&args, "--debug-info"),
        debug_breakpoint: has(&args, "--breakpoints"),
        ..CodegenConfig::default()
    };

    let code = if bf {
        read_text(filename)
    } else {
        let ir = if from_ir {
            let bytes = fs::read(filename)
                .unwrap_or_else(|e| fail(format!("failed to read '{}': {}", filename, e)));
            ProgramIr::from_bytes(&bytes).unwrap_or_else(|e| fail(e))
        } else {
            compile_to_ir(&read_text(filename)).unwrap_or_else(|e| fail(e))
        };

        if let Some(path) = value(&args, "--emit-ir") {
            let bytes = ir.to_bytes().unwrap_or_else(|e| fail(e));
            fs::write(path, bytes)
                .unwrap_or_else(|e| fail(format!("failed to write '{}': {}", path, e)));
        }

        let insns = lower(&ir).unwrap_or_else(|e| fail(e));
        if has(&args, "--ir") {
            print_program(&ir);
            print_lowered(&insns);
            print_stats(&insns);
            return;
        }
        generate(&insns, &codegen).unwrap_or_else(|e| fail(e))
    };

    let run = has(&args, "--run");
    let debug = has(&args, "--debug");

    if let Some(path) = value(&args, "-o") {
        fs::write(path, &code)
            .unwrap_or_else(|e| fail(format!("failed to write '{}': {}", path, e)));
    } else if !run && !debug {
        println!("{}", code);
    }

    if run || debug {
        let config = vm_config(&args, &codegen);
        run_code(&code, config, debug);
    }
}

fn print_usage() {
    println!("TAPEC - compiler from a small structured language to tape code");
    println!();
    println!("Usage:");
    println!("  tapec <file.tc>                 Print the compiled tape code");
    println!("  tapec --run <file.tc>           Compile and run on stdin/stdout");
    println!("  tapec --debug <file.tc>         Run, dumping the tape at each breakpoint");
    println!("  tapec --tokens <file.tc>        Show tokens only (--no-color, --pretty)");
    println!("  tapec --ast <file.tc>           Show the syntax tree");
    println!("  tapec --ir <file.tc>            Show the IR before and after the passes");
    println!();
    println!("Options:");
    println!("  -o <path>                       Write the tape code to <path>");
    println!("  --emit-ir <path>                Write the binary IR to <path>");
    println!("  --from-ir                       Input is a binary IR file");
    println!("  --bf                            Input is tape code");
    println!("  --debug-info                    Annotate the code with the IR it came from");
    println!("  --breakpoints                   Put a breakpoint before every instruction");
    println!("  --tape-len N                    Tape length (default 30000)");
    println!("  --max-steps N                   Stop after N steps");
    println!("  --eof zero|unchanged|max        What ',' reads at end of input");
    println!("  --verbose, --trace              Log to stderr");
    println!("  --help, -h                      Show this help");
}

fn init_logging(verbose: bool, trace: bool) {
    let level = if trace {
        Level::TRACE
    } else if verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn has(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn number(args: &[String], flag: &str) -> Option<usize> {
    value(args, flag).map(|v| {
        v.parse()
            .unwrap_or_else(|_| fail(format!("{} expects a number, got '{}'", flag, v)))
    })
}

/// First argument that is neither a flag nor a flag's value.
fn input_file(args: &[String]) -> Option<&str> {
    let mut skip = true; // program name
    for arg in args {
        if std::mem::take(&mut skip) {
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            skip = true;
        } else if !arg.starts_with('-') {
            return Some(arg);
        }
    }
    None
}

fn ensure_extension(filename: &str) {
    let path = Path::new(filename);
    if path.extension().and_then(|e| e.to_str()) != Some("tc") {
        eprintln!("Error: expected a .tc file, got {}", filename);
        std::process::exit(1);
    }
}

fn read_text(filename: &str) -> String {
    fs::read_to_string(filename)
        .unwrap_or_else(|e| fail(format!("failed to read '{}': {}", filename, e)))
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn dump_tokens(source: &str, no_color: bool, pretty: bool) {
    let mut lexer = Lexer::new(source);

    match lexer.tokenize() {
        Ok(tokens) => {
            let mut dumper = TokenDumper::new();

            if no_color {
                dumper = dumper.no_color();
            }
            if pretty {
                dumper = dumper.pretty();
            }

            dumper.dump(&tokens);
        }
        Err(e) => fail(format!("Lexer error: {}", e)),
    }
}

fn vm_config(args: &[String], codegen: &CodegenConfig) -> TapeVmConfig {
    let defaults = TapeVmConfig::default();
    let eof = match value(args, "--eof") {
        Some(name) => EofBehavior::from_name(name).unwrap_or_else(|| {
            fail(format!("--eof expects zero, unchanged or max, got '{}'", name))
        }),
        None => defaults.eof,
    };
    TapeVmConfig {
        tape_len: number(args, "--tape-len").unwrap_or(defaults.tape_len),
        max_steps: number(args, "--max-steps").or(defaults.max_steps),
        eof,
        breakpoints: true,
        breakpoint_char: codegen.breakpoint_char,
    }
}

fn run_code(code: &str, config: TapeVmConfig, debug: bool) {
    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();
    let mut vm = TapeVm::new(code, stdin, stdout, config).unwrap_or_else(|e| fail(e));

    if !debug {
        vm.run().unwrap_or_else(|e| fail(e));
        return;
    }

    let dump = TapeDump::new();
    loop {
        match vm.run_to_breakpoint() {
            Ok(StepResult::Halted) => break,
            Ok(_) => {
                let mut err = io::stderr().lock();
                let _ = writeln!(err, "\n-- breakpoint, step {} --", vm.steps());
                let _ = write!(err, "{}", dump.format(&vm));
            }
            Err(e) => fail(e),
        }
    }
    eprintln!("\n-- halted after {} steps --", vm.steps());
}
