use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = format!("{:#}", err).to_lowercase();

    if msg.contains("browser bridge") || msg.contains("browser session is closed") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check the Node.js and Playwright runtime with:");
        eprintln!("  {} crawlflow probe", "$".dimmed());
    }

    if msg.contains("not defined in the step graph") || msg.contains("invalid run configuration") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check the document with:");
        eprintln!("  {} crawlflow validate <CONFIG>", "$".dimmed());
    }

    std::process::exit(1);
}
