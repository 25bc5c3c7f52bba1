//! Operator console: built-in host commands plus anything plugins register.

use owl_core::{OwlContext, OwlError};
use plugin_greeter::{PlayerChatEvent, PlayerJoinEvent};
use std::io::{self, BufRead};
use std::thread;
use tracing::{info, warn};

/// Handle one console line and return the text to show the operator.
///
/// `join` and `chat` stand in for a game server and publish player events;
/// other built-ins report on the running core.
pub fn handle_line(ctx: &OwlContext, line: &str) -> String {
    let line = line.trim();
    let mut words = line.split_whitespace();
    match words.next() {
        None => String::new(),
        Some("help") => help(ctx),
        Some("plugins") => {
            let enabled = ctx.plugins().enabled_plugins();
            let listed: Vec<String> = enabled
                .iter()
                .map(|id| match ctx.plugins().plugin_version(id) {
                    Some(version) => format!("{id} v{version}"),
                    None => id.clone(),
                })
                .collect();
            format!("Plugins ({}): {}", listed.len(), listed.join(", "))
        }
        Some("services") => {
            let statuses = ctx.services().service_statuses();
            if statuses.is_empty() {
                return "No services registered".to_string();
            }
            statuses
                .iter()
                .map(|(id, status)| format!("{id}: {status}"))
                .collect::<Vec<_>>()
                .join("\n")
        }
        Some("stats") => {
            let stats = ctx.events().stats();
            format!(
                "{} events published | {} dispatches ({} ok, {} failed) | {} listeners | {} components",
                stats.events_published,
                stats.dispatches_submitted,
                stats.dispatches_completed,
                stats.dispatches_failed,
                stats.total_listeners,
                ctx.registry().component_count()
            )
        }
        Some("join") => match words.next() {
            Some(player) => publish(ctx, PlayerJoinEvent { player: player.to_string() }),
            None => "Usage: join <player>".to_string(),
        },
        Some("chat") => {
            let Some(player) = words.next() else {
                return "Usage: chat <player> <message...>".to_string();
            };
            let message = words.collect::<Vec<_>>().join(" ");
            publish(
                ctx,
                PlayerChatEvent {
                    player: player.to_string(),
                    message,
                },
            )
        }
        Some(_) => match ctx.commands().dispatch(line) {
            Ok(result) if result.success => result.message,
            Ok(result) => format!("Failed: {}", result.message),
            Err(OwlError::CommandNotFound(name)) => {
                format!("Unknown command '{name}'. Type 'help' for a list.")
            }
            Err(e) => format!("Error: {e}"),
        },
    }
}

fn publish<E: owl_core::Event>(ctx: &OwlContext, event: E) -> String {
    match ctx.events().publish(event) {
        Ok(count) => format!("Event published to {count} listener(s)"),
        Err(e) => format!("Error: {e}"),
    }
}

fn help(ctx: &OwlContext) -> String {
    let mut lines = vec![
        "help | plugins | services | stats".to_string(),
        "join <player> | chat <player> <message...>".to_string(),
    ];
    for name in ctx.commands().names() {
        if let Some(command) = ctx.commands().get(&name) {
            lines.push(format!("{} - {}", command.usage(), command.description()));
        }
    }
    lines.join("\n")
}

/// Answer stdin lines on a dedicated thread until EOF. The thread is never
/// joined; it ends with the process.
pub fn spawn_console(ctx: OwlContext) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("owl-console".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        for part in handle_line(&ctx, &line).lines() {
                            info!("💬 {}", part);
                        }
                    }
                    Err(e) => {
                        warn!("Console input failed: {}", e);
                        break;
                    }
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugin_greeter::GreeterPlugin;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn running(dir: &TempDir) -> OwlContext {
        let ctx = OwlContext::builder(dir.path()).build();
        ctx.enable().unwrap();
        ctx.plugins().add(Arc::new(GreeterPlugin::new())).unwrap();
        ctx.plugins().enable_all(&ctx);
        ctx
    }

    #[test]
    fn test_builtins() {
        let dir = TempDir::new().unwrap();
        let ctx = running(&dir);

        assert_eq!(handle_line(&ctx, "   "), "");
        assert!(handle_line(&ctx, "plugins").starts_with("Plugins (1): greeter v"));
        assert_eq!(handle_line(&ctx, "services"), "greeter.welcome: running");
        assert!(handle_line(&ctx, "help").contains("/greet <player>"));
        assert_eq!(handle_line(&ctx, "join"), "Usage: join <player>");
        assert_eq!(
            handle_line(&ctx, "join Steve"),
            "Event published to 1 listener(s)"
        );
        assert!(handle_line(&ctx, "stats").contains("listeners"));

        ctx.plugins().disable_all(&ctx);
        ctx.disable();
    }

    #[test]
    fn test_plugin_commands() {
        let dir = TempDir::new().unwrap();
        let ctx = running(&dir);

        assert_eq!(
            handle_line(&ctx, "greet Alex"),
            "Welcome to the server, Alex!"
        );
        assert_eq!(handle_line(&ctx, "greet"), "Failed: Usage: /greet <player>");
        assert_eq!(
            handle_line(&ctx, "fly"),
            "Unknown command 'fly'. Type 'help' for a list."
        );

        ctx.plugins().disable_all(&ctx);
        ctx.disable();
    }

    #[test]
    fn test_publish_after_disable_reports_error() {
        let dir = TempDir::new().unwrap();
        let ctx = running(&dir);
        ctx.plugins().disable_all(&ctx);
        ctx.disable();

        assert!(handle_line(&ctx, "join Steve").starts_with("Error:"));
        assert_eq!(handle_line(&ctx, "services"), "No services registered");
    }
}
