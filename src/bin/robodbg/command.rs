use std::borrow::Cow;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub enum Command {
    Load(String),
    Reset,
    Step(usize),
    Run,
    Regs,
    Rom,
    Repeat,
    Exit,
}

impl FromStr for Command {
    type Err = Cow<'static, str>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut iter = s.split_whitespace();
        match iter.next() {
            Some("load") => {
                let path = iter.next().ok_or("missing file name")?;
                Ok(Command::Load(path.to_string()))
            }
            Some("reset") => Ok(Command::Reset),
            Some("step") | Some("s") | Some("next") | Some("n") => {
                let count = match iter.next() {
                    Some(s) => s.parse::<usize>().map_err(|e| e.to_string())?,
                    None => 1,
                };
                Ok(Command::Step(count))
            }
            Some("run") | Some("r") => Ok(Command::Run),
            Some("regs") | Some("registers") => Ok(Command::Regs),
            Some("rom") => Ok(Command::Rom),
            Some("repeat") | None => Ok(Command::Repeat),
            Some("exit") | Some("quit") | Some("q") => Ok(Command::Exit),
            Some(command) => Err(format!("invalid command {:?}", command).into()),
        }
    }
}
