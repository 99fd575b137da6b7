//! services/api/src/bin/chat.rs
//!
//! Terminal client for the study companion. Plain lines are sent to the tutor
//! and the reply is streamed to stdout; lines starting with `/` are commands.

use companion_api_lib::{
    adapters::{FileStore, HttpStudyContentAdapter, ProxyChatAdapter},
    config::Config,
    error::ApiError,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use study_companion_core::domain::{Message, Mode, Role, StudyContent, StudyItem, StudyKind};
use study_companion_core::generator::StudyItemGenerator;
use study_companion_core::ports::GenerateRequest;
use study_companion_core::session_manager::SessionManager;
use study_companion_core::store::CompanionStore;
use study_companion_core::suggestions::{contextual_suggestions, follow_up_actions};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const HELP: &str = "\
Commands:
  /new                      start a new chat
  /list                     list chats, most recent first
  /switch <id>              open another chat
  /rename <title>           rename the current chat
  /delete <id>              delete a chat
  /mode [<mode>]            show or change the subject mode
  /settings [<key> <value>] show or change settings (mode, detail, followups, timer)
  /export [<path>]          export all chats as JSON
  /flashcards <prompt>      generate flashcards
  /guide <prompt>           generate a study guide
  /test <prompt>            generate a practice test
  /library                  list saved study items
  /study <item-id>          discuss a saved study item
  /clear yes                delete all stored data
  /quit                     exit";

struct Repl {
    manager: SessionManager,
    generator: StudyItemGenerator,
}

enum Flow {
    Continue,
    Quit,
}

impl Repl {
    async fn handle(&mut self, line: &str) -> Result<Flow, ApiError> {
        let Some(command) = line.strip_prefix('/') else {
            self.send(line).await?;
            return Ok(Flow::Continue);
        };
        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match name {
            "quit" | "exit" => return Ok(Flow::Quit),
            "help" => println!("{}", HELP),
            "new" => {
                self.manager.new_chat().await?;
                self.print_header();
            }
            "list" => self.list_sessions().await,
            "switch" => {
                if self.manager.switch_to(arg).await? {
                    self.print_header();
                    self.print_history();
                } else {
                    println!("No other chat with id '{}'.", arg);
                }
            }
            "rename" => {
                let id = self.manager.current().id.clone();
                if !self.manager.rename(&id, arg).await? {
                    println!("Usage: /rename <title>");
                }
            }
            "delete" => {
                let id = if arg.is_empty() { self.manager.current().id.clone() } else { arg.to_string() };
                self.manager.delete(&id).await?;
                self.print_header();
            }
            "mode" => self.mode(arg).await?,
            "settings" => self.settings(arg).await?,
            "export" => {
                let json = self.manager.store().export_sessions().await?;
                if arg.is_empty() {
                    println!("{}", json);
                } else {
                    tokio::fs::write(arg, json).await?;
                    println!("Exported chats to {}", arg);
                }
            }
            "flashcards" => self.generate(StudyKind::Flashcards, arg).await?,
            "guide" => self.generate(StudyKind::StudyGuide, arg).await?,
            "test" => self.generate(StudyKind::PracticeTest, arg).await?,
            "library" => self.list_study_items().await,
            "study" => match self.manager.store().study_item(arg).await {
                Some(item) => {
                    self.manager.open_study_discussion(&item).await?;
                    self.print_header();
                    self.print_history();
                }
                None => println!("No study item with id '{}'.", arg),
            },
            "clear" if arg == "yes" => {
                self.manager.clear_all().await?;
                println!("All data cleared.");
                self.print_header();
            }
            "clear" => println!("This deletes every chat, study item and setting. Type '/clear yes' to confirm."),
            _ => println!("Unknown command '/{}'. Type /help for the list.", name),
        }
        Ok(Flow::Continue)
    }

    async fn send(&mut self, text: &str) -> Result<(), ApiError> {
        let mut reply = match self.manager.send_message(text).await {
            Ok(reply) => reply,
            Err(e) => {
                println!("⚠️  {}", e);
                return Ok(());
            }
        };

        print!("{} ", self.manager.current().mode.emoji());
        while let Some(fragment) = reply.next_fragment().await {
            if let Ok(fragment) = fragment {
                print!("{}", fragment);
                if let Err(e) = std::io::stdout().flush() {
                    debug!("Failed to flush stdout: {}", e);
                }
            }
        }
        println!();

        let outcome = reply.finish().await;
        match self.manager.complete_reply(outcome).await {
            Ok(answer) => self.print_follow_ups(&answer).await,
            Err(e) => println!("⚠️  {}", e),
        }
        Ok(())
    }

    async fn print_follow_ups(&self, answer: &str) {
        if !self.manager.store().settings().await.auto_follow_up {
            return;
        }
        let mode = self.manager.current().mode;
        for suggestion in contextual_suggestions(mode, answer) {
            println!("  💡 {}", suggestion);
        }
        let actions: Vec<String> = follow_up_actions(mode)
            .iter()
            .map(|a| format!("{} {}", a.icon, a.label))
            .collect();
        println!("  {}", actions.join("  ·  "));
    }

    async fn mode(&mut self, arg: &str) -> Result<(), ApiError> {
        if arg.is_empty() {
            for mode in Mode::all() {
                let marker = if mode == self.manager.current().mode { "*" } else { " " };
                println!("{} {} {:<10} {}", marker, mode.emoji(), mode.as_str(), mode.display_name());
            }
            return Ok(());
        }
        let Some(mode) = Mode::parse(arg) else {
            println!("Unknown mode '{}'.", arg);
            return Ok(());
        };
        match self.manager.change_mode(mode).await {
            Ok(()) => println!("Mode set to {} {}.", mode.emoji(), mode.display_name()),
            Err(e) => println!("⚠️  {}", e),
        }
        Ok(())
    }

    async fn settings(&mut self, arg: &str) -> Result<(), ApiError> {
        let store = self.manager.store();
        let mut settings = store.settings().await;
        if let Some((key, value)) = arg.split_once(char::is_whitespace) {
            let value = value.trim();
            match key {
                "mode" => settings.default_mode = Mode::parse_or_general(value),
                "detail" => settings.detail_level = value.to_string(),
                "followups" => settings.auto_follow_up = matches!(value, "on" | "true" | "yes"),
                "timer" => match value.parse() {
                    Ok(minutes) => settings.focus_timer_default = minutes,
                    Err(_) => {
                        println!("The timer takes a number of minutes.");
                        return Ok(());
                    }
                },
                _ => {
                    println!("Unknown setting '{}'.", key);
                    return Ok(());
                }
            }
            store.save_settings(&settings).await?;
        }
        println!("{}", serde_json::to_string_pretty(&settings).unwrap_or_default());
        Ok(())
    }

    async fn generate(&mut self, kind: StudyKind, prompt: &str) -> Result<(), ApiError> {
        let mut request = GenerateRequest::new(kind, prompt);
        request.title = (!prompt.is_empty()).then(|| prompt.to_string());
        request.subject = Some(self.manager.current().mode.as_str().to_string());

        println!("{} Generating {}...", kind.emoji(), kind.display_name());
        let item = match self.generator.create_item(&request).await {
            Ok(item) => item,
            Err(e) => {
                println!("⚠️  {}", e);
                return Ok(());
            }
        };
        self.manager.store().save_study_item(&item).await?;
        print_study_item(&item);
        println!("Saved as {}. Use /study {} to discuss it.", item.id, item.id);
        Ok(())
    }

    async fn list_sessions(&self) {
        for session in self.manager.store().recent_sessions().await {
            let marker = if session.id == self.manager.current().id { "*" } else { " " };
            println!(
                "{} {}  {} {} ({} messages)",
                marker,
                session.id,
                session.mode.emoji(),
                session.title,
                session.messages.iter().filter(|m| m.is_visible()).count()
            );
        }
    }

    async fn list_study_items(&self) {
        let items = self.manager.store().recent_study_items().await;
        if items.is_empty() {
            println!("No study items yet.");
        }
        for item in items {
            println!("{}  {} {}", item.id, item.kind().emoji(), item.title);
        }
    }

    fn print_header(&self) {
        let session = self.manager.current();
        println!("── {} {} [{}] ──", session.mode.emoji(), session.title, session.id);
    }

    fn print_history(&self) {
        for message in self.manager.visible_messages() {
            print_message(message);
        }
    }
}

fn print_message(message: &Message) {
    let who = match message.role {
        Role::User => "You",
        Role::Assistant => "Korah",
        Role::System => return,
    };
    println!("{}: {}\n", who, message.content);
}

fn print_study_item(item: &StudyItem) {
    println!("{} {}", item.kind().emoji(), item.title);
    match &item.content {
        StudyContent::Flashcards { cards } => {
            for (i, card) in cards.iter().enumerate() {
                println!("{:>3}. {}\n     → {}", i + 1, card.front, card.back);
            }
        }
        StudyContent::StudyGuide { markdown } => println!("{}", markdown),
        StudyContent::PracticeTest { questions } => {
            for (i, question) in questions.iter().enumerate() {
                println!("{:>3}. {}\n     Answer: {}", i + 1, question.text, question.answer);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let config = Config::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with_writer(std::io::stderr)
        .init();

    let store = CompanionStore::new(Arc::new(FileStore::open(&config.data_dir).await?));
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    let chat = Arc::new(ProxyChatAdapter::new(
        client.clone(),
        config.proxy_url.clone(),
        config.chat_model.clone(),
        config.chat_temperature,
    ));
    let endpoint = Arc::new(HttpStudyContentAdapter::new(client, config.study_api_url.clone()));
    let generator = StudyItemGenerator::new(Some(endpoint), chat.clone())
        .with_temperature(config.study_temperature);
    let manager = SessionManager::open(store, chat).await?;
    debug!("Data directory: {}", config.data_dir.display());

    let mut repl = Repl { manager, generator };
    println!("Korah study companion. Type /help for commands.");
    repl.print_header();
    repl.print_history();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match repl.handle(line).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => println!("⚠️  {}", e),
        }
    }
    Ok(())
}
