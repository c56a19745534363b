/// One line typed at the client console.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Open,
    Close,
    Clear,
    State,
    Quit,
    /// Anything else is sent as-is, newline included.
    Send(Vec<u8>),
}

pub fn parse(line: &str) -> Command {
    match line.trim_end_matches(['\r', '\n']) {
        ":open" => Command::Open,
        ":close" => Command::Close,
        ":clear" => Command::Clear,
        ":state" => Command::State,
        ":quit" | ":q" => Command::Quit,
        text => {
            let mut payload = Vec::with_capacity(text.len() + 1);
            payload.extend_from_slice(text.as_bytes());
            payload.push(b'\n');
            Command::Send(payload)
        }
    }
}
