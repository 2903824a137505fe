#[macro_use]
extern crate colorify;

mod command;
mod display;

use std::fs;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use robobrain::{Assembler, Vm};

use command::Command;

const HISTORY_FILE: &str = "robodbg_history.txt";

struct Session {
    vm: Vm,
    asm: Assembler,
    loaded_from: Option<String>,
}

impl Session {
    fn new() -> Session {
        Session {
            vm: Vm::new(),
            asm: Assembler::new(),
            loaded_from: None,
        }
    }

    fn load(&mut self, path: &str) {
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                printlnc!(red: "couldn't read {}: {}", path, e);
                return;
            }
        };
        self.vm = Vm::new();
        match self.asm.compile(&source, &mut self.vm) {
            Ok(()) => {
                self.loaded_from = Some(path.to_string());
                printlnc!(green: "assembled {} ({} bytes burned)", path, self.vm.rom_size());
            }
            Err(e) => printlnc!(red: "assembly failed: {}", e),
        }
    }

    fn execute(&mut self, command: &Command) {
        match command {
            Command::Load(path) => self.load(path),
            Command::Reset => {
                self.vm.reset();
                printlnc!(yellow: "registers, PC and RWP reset");
            }
            Command::Step(count) => {
                for _ in 0..*count {
                    if self.vm.is_halted() {
                        printlnc!(yellow: "halted, not stepping further");
                        break;
                    }
                    self.vm.step();
                }
                self.report();
            }
            Command::Run => {
                self.vm.run();
                self.report();
            }
            Command::Regs => self.report(),
            Command::Rom => print!("{}", self.vm.print_rom()),
            Command::Repeat | Command::Exit => unreachable!(),
        }
    }

    fn report(&self) {
        println!("{}", display::format_registers(&self.vm.registers()));
        println!("{}", display::format_errors(&self.vm.errors()));
        if self.vm.is_halted() {
            printlnc!(yellow: "halted");
        }
    }
}

fn main() {
    env_logger::init();

    let mut rl = DefaultEditor::new().expect("failed to start line editor");
    if rl.load_history(HISTORY_FILE).is_err() {
        printlnc!(yellow: "No previous history.");
    }

    let mut session = Session::new();
    let mut last_command: Option<Command> = None;

    loop {
        let prompt = format!(colorify!(dark_grey: "({}) "), "robodbg");
        match rl.readline(&prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());

                let command = match (line.parse(), last_command.clone()) {
                    (Ok(Command::Repeat), Some(c)) => Ok(c),
                    (Ok(Command::Repeat), None) => Err("No last command.".to_string()),
                    (Ok(c), _) => Ok(c),
                    (Err(e), _) => Err(e.to_string()),
                };

                match command {
                    Ok(Command::Exit) => break,
                    Ok(Command::Repeat) => unreachable!(),
                    Ok(ref c) => session.execute(c),
                    Err(ref e) => printlnc!(red: "{}", e),
                }
                last_command = command.ok();
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    let _ = rl.save_history(HISTORY_FILE);
}
