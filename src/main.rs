use clap::Parser;
use clap::error::ErrorKind as ClapErrorKind;
use mylox::backend::vm::{InterpretResult, LogLevel, VirtualMachine};
use rustyline::error::ReadlineError;
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "mylox")]
#[command(version = "1.0")]
#[command(author = "Yuyang Feng && Zimeng Li")]
#[command(about = "Mylox: A bytecode compiler and VM for the Lox language", long_about = None)]
struct Cli {
    /// 脚本路径；缺省进入 REPL
    script: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = LogLevel::Release)]
    mode: LogLevel,

    /// 每个安全点强制收集一次，用于排查 GC 相关问题
    #[arg(long)]
    gc_stress: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                let _ = err.print();
                process::exit(0);
            }
            _ => {
                // 参数不对：用法说明进 stderr，退出码 64
                let _ = err.print();
                process::exit(64);
            }
        },
    };

    let mut vm = VirtualMachine::new(cli.mode);
    vm.gc_stress = cli.gc_stress;

    match cli.script {
        Some(path) => run_file(&mut vm, &path),
        None => repl(&mut vm),
    }
}

fn run_file(vm: &mut VirtualMachine, path: &PathBuf) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("[Error] failed to read source file {}: {}", path.display(), err);
            process::exit(74);
        }
    };

    if vm.log_level != LogLevel::Release {
        println!("[Mylox] Interpreting: {}", path.display());
    }

    match vm.interpret(&source) {
        InterpretResult::Ok => {}
        InterpretResult::CompileError => process::exit(65),
        InterpretResult::RuntimeError => process::exit(70),
    }
}

/// 一行一段程序，全局状态跨行保留，出错不退出。
fn repl(vm: &mut VirtualMachine) {
    let mut editor = match rustyline::DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("[Error] failed to initialize line editor: {}", err);
            process::exit(74);
        }
    };

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                vm.interpret(&line);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("[Error] readline failure: {}", err);
                break;
            }
        }
    }
}
