use crate::history::ConversationSummary;
use colored::*;
use std::io::Write;

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "=".repeat(text.chars().count()).bright_cyan());
}

pub fn print_success(text: &str) {
    println!("{}", text.green());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_warning(text: &str) {
    println!("{}", text.yellow());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

pub fn print_prompt(text: &str) {
    print!("{}", text.yellow().bold());
    let _ = std::io::stdout().flush();
}

/// Plain-text table of conversation summaries
pub fn format_summary_table(conversations: &[ConversationSummary]) -> String {
    let id_width = conversations
        .iter()
        .map(|c| c.id.chars().count())
        .chain(std::iter::once("ID".len()))
        .max()
        .unwrap_or(2);
    let count_header = "Messages";

    let mut table = format!(
        "{:<id_width$}  {:>count_width$}  {}\n",
        "ID",
        count_header,
        "Last Message",
        id_width = id_width,
        count_width = count_header.len()
    );
    for conversation in conversations {
        table.push_str(&format!(
            "{:<id_width$}  {:>count_width$}  {}\n",
            conversation.id,
            conversation.message_count,
            conversation.last_message.replace('\n', " "),
            id_width = id_width,
            count_width = count_header.len()
        ));
    }
    table
}

pub fn print_conversations(conversations: &[ConversationSummary]) {
    if conversations.is_empty() {
        print_warning("No conversation history found.");
        return;
    }
    print_header("Conversation Summary");
    print!("{}", format_summary_table(conversations));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_table_layout() {
        let rows = vec![
            ConversationSummary {
                id: "default".to_string(),
                last_message: "line one\nline two".to_string(),
                message_count: 12,
            },
            ConversationSummary {
                id: "c2".to_string(),
                last_message: "short".to_string(),
                message_count: 1,
            },
        ];

        let table = format_summary_table(&rows);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ID       Messages  Last Message");
        assert_eq!(lines[1], "default        12  line one line two");
        assert_eq!(lines[2], "c2              1  short");
    }
}
