#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Print,
    Clipboard,
}

pub fn handle_output(payload: &str, mode: OutputMode) -> Result<(), Box<dyn std::error::Error>> {
    match mode {
        OutputMode::Print => {
            println!("{}", payload);
        }
        OutputMode::Clipboard => {
            let mut clipboard = arboard::Clipboard::new()?;
            clipboard.set_text(payload)?;
            eprintln!("Payload copied to clipboard");
        }
    }
    Ok(())
}
