use std::io::{self, BufRead, Write};
use std::rc::Rc;
use std::{env, fs, path::Path};

use loom::bytecode::asm::assemble;
use loom::bytecode::disasm::disassemble;
use loom::bytecode::format;
use loom::bytecode::stack_check::check_program;
use loom::bytecode::Program;
use loom::runtime::library::FunctionLibrary;
use loom::runtime::storage::MemoryVariableStorage;
use loom::runtime::{
    DialogueHandler, ExecutionStatus, Library, OptionSelection, VirtualMachine,
};

struct Options {
    filename: String,
    start: String,
    disasm: bool,
    check: bool,
    emit: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() == 1 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let options = match parse_args(&args[1..]) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("Error: {}", message);
            print_usage();
            std::process::exit(1);
        }
    };

    let program = load_program(&options.filename);

    if let Some(out) = &options.emit {
        emit_program(&program, out);
    }
    if options.disasm {
        print!("{}", disassemble(&program));
    }
    if options.check {
        check(&program);
    }

    // Tooling modes do not play the dialogue.
    if options.emit.is_some() || options.disasm || options.check {
        return;
    }

    play(program, &options.start);
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut filename = None;
    let mut start = "Start".to_string();
    let mut disasm = false;
    let mut check = false;
    let mut emit = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--disasm" => disasm = true,
            "--check" => check = true,
            "--start" => {
                start = iter.next().ok_or("--start needs a node name")?.clone();
            }
            "--emit" => {
                emit = Some(iter.next().ok_or("--emit needs an output path")?.clone());
            }
            flag if flag.starts_with('-') => return Err(format!("unknown flag '{}'", flag)),
            // first non-flag argument is the filename
            _ if filename.is_none() => filename = Some(arg.clone()),
            _ => return Err(format!("unexpected argument '{}'", arg)),
        }
    }

    Ok(Options {
        filename: filename.ok_or("no input file")?,
        start,
        disasm,
        check,
        emit,
    })
}

fn print_usage() {
    println!("LOOM - dialogue bytecode runtime");
    println!();
    println!("Usage:");
    println!("  loom <file.loom>                  Assemble and play a program");
    println!("  loom <file.loomc>                 Play a compiled program");
    println!("  loom <file> --start <Node>        Start at a node other than 'Start'");
    println!("  loom <file> --disasm              Print the disassembly");
    println!("  loom <file> --check               Run the stack checker");
    println!("  loom <file> --emit <out.loomc>    Write the compiled program");
    println!("  loom --help, -h                   Show this help");
    println!();
    println!("Set RUST_LOG=loom=debug to trace execution.");
}

fn load_program(filename: &str) -> Program {
    let path = Path::new(filename);
    let extension = path.extension().and_then(|e| e.to_str());

    let result = match extension {
        Some("loom") => fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", filename, e))
            .and_then(|source| {
                assemble(&source).map_err(|e| format!("Assembly error: {}:{}", filename, e))
            }),
        Some("loomc") => fs::read(path)
            .map_err(|e| format!("Failed to read '{}': {}", filename, e))
            .and_then(|bytes| {
                format::from_bytes(&bytes).map_err(|e| format!("Load error: {}: {}", filename, e))
            }),
        _ => Err(format!("Error: expected a .loom or .loomc file, got {}", filename)),
    };

    match result {
        Ok(program) => program,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(1);
        }
    }
}

fn emit_program(program: &Program, out: &str) {
    let bytes = match format::to_bytes(program) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Encode error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = fs::write(out, bytes) {
        eprintln!("Failed to write '{}': {}", out, e);
        std::process::exit(1);
    }
}

fn check(program: &Program) {
    let library = FunctionLibrary::standard();
    match check_program(program, Some(&library as &dyn Library)) {
        Ok(()) => println!("ok: {} node(s) checked", program.nodes().len()),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Terminal front end for playing a program.
#[derive(Default)]
struct Console {
    selection: Option<OptionSelection>,
}

impl DialogueHandler for Console {
    fn run_line(&mut self, text: &str) {
        println!("{}", text);
    }

    fn run_command(&mut self, text: &str) {
        println!("<<{}>>", text);
    }

    fn show_options(&mut self, options: &[String], selection: OptionSelection) {
        for (i, option) in options.iter().enumerate() {
            println!("  {}) {}", i + 1, option);
        }
        self.selection = Some(selection);
    }

    fn node_complete(&mut self, _next_node: Option<&str>) {}
}

fn play(program: Program, start: &str) {
    let mut vm = VirtualMachine::new(
        Rc::new(program),
        Rc::new(MemoryVariableStorage::new()),
        Rc::new(FunctionLibrary::standard()),
    );

    if let Err(e) = vm.select_node(start) {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }

    let mut console = Console::default();
    let stdin = io::stdin();
    let mut input = stdin.lock().lines();

    loop {
        match vm.run(&mut console) {
            Ok(ExecutionStatus::WaitingOnOptionSelection) => {}
            Ok(_) => return,
            Err(e) => {
                eprintln!("Runtime error: {}", e);
                std::process::exit(1);
            }
        }

        let Some(mut selection) = console.selection.take() else {
            return;
        };

        loop {
            print!("> ");
            if let Err(e) = io::stdout().flush() {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }

            let Some(Ok(line)) = input.next() else {
                vm.stop();
                return;
            };

            let index = match line.trim().parse::<usize>() {
                Ok(n) if n >= 1 => n - 1,
                _ => {
                    println!("Enter a number between 1 and {}", selection.option_count());
                    continue;
                }
            };

            match vm.select_option(selection, index) {
                Ok(()) => break,
                Err(rejected) => {
                    println!("{}", rejected.error);
                    selection = rejected.selection;
                }
            }
        }
    }
}
