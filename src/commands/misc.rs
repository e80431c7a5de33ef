//! Miscellaneous Commands
//!
//! `.ping`, `.version`, `.info`, `.exec` and `.sendlog`.

use std::time::Instant;

use chat_companion_core::{visible_len, InboundEvent, OutgoingFile, UserQuery};

use crate::models::settings::StreamingPolicy;
use crate::services::exec::{CommandLine, ExecMode, KillReason, NullSink, Termination};
use crate::services::remote::adapters::telegram::{LIBRARY_NAME, LIBRARY_VERSION};
use crate::services::remote::registry::CommandRegistry;
use crate::services::remote::response_mapper::ResponseMapper;
use crate::services::remote::types::{CommandContext, CommandFuture, CommandSpec, LiveMessage};
use crate::services::upload::send_from_disk;
use crate::utils::error::AppResult;

pub const MODULE: &str = "misc";

/// Attachment name for `.exec` output too long to inline.
const RESULT_FILE_NAME: &str = "result.txt";

/// Telegram caption ceiling.
const CAPTION_LIMIT: usize = 1024;

pub fn register(registry: &mut CommandRegistry) {
    registry.register(
        CommandSpec::new("ping", ping_handler)
            .with_help("Measure the round trip to the configured ping URL")
            .in_module(MODULE),
    );
    registry.register(
        CommandSpec::new("version", version_handler)
            .with_help("Show bot and library versions")
            .in_module(MODULE),
    );
    registry.register(
        CommandSpec::new("info", info_handler)
            .with_help("Show info about a user: .info [id/@handle], or reply to their message")
            .in_module(MODULE),
    );
    registry.register(
        CommandSpec::new("exec", exec_handler)
            .with_help("Run code with the configured interpreter: .exec <code>")
            .in_module(MODULE),
    );
    registry.register(
        CommandSpec::new("sendlog", sendlog_handler)
            .with_help("Upload the capture logs as a zip")
            .in_module(MODULE),
    );
}

fn ping_handler(ctx: CommandContext, event: InboundEvent) -> CommandFuture {
    Box::pin(ping(ctx, event))
}

fn version_handler(ctx: CommandContext, event: InboundEvent) -> CommandFuture {
    Box::pin(version(ctx, event))
}

fn info_handler(ctx: CommandContext, event: InboundEvent) -> CommandFuture {
    Box::pin(info(ctx, event))
}

fn exec_handler(ctx: CommandContext, event: InboundEvent) -> CommandFuture {
    Box::pin(exec(ctx, event))
}

fn sendlog_handler(ctx: CommandContext, event: InboundEvent) -> CommandFuture {
    Box::pin(sendlog(ctx, event))
}

async fn ping(ctx: CommandContext, event: InboundEvent) -> AppResult<()> {
    let started = Instant::now();
    ctx.http.get(&ctx.config.ping_url).send().await?;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    ctx.edit(&event, &format!("Ping time was: {:.2}ms", elapsed_ms))
        .await?;
    Ok(())
}

async fn version(ctx: CommandContext, event: InboundEvent) -> AppResult<()> {
    let text = ResponseMapper::format_version(
        env!("CARGO_PKG_VERSION"),
        LIBRARY_NAME,
        LIBRARY_VERSION,
    );
    ctx.edit(&event, &text).await?;
    Ok(())
}

/// Who `.info` describes: the argument, else the author of the replied
/// message, else the sender.
fn info_target(event: &InboundEvent) -> AppResult<UserQuery> {
    if let Some(arg) = event.argument().split_whitespace().next() {
        return Ok(UserQuery::parse(arg)?);
    }
    Ok(match event.replied_sender_id {
        Some(id) => UserQuery::Id(id),
        None => UserQuery::Id(event.sender_id),
    })
}

async fn info(ctx: CommandContext, event: InboundEvent) -> AppResult<()> {
    let query = info_target(&event)?;
    let user = match ctx.backend.resolve_user(&query).await {
        Ok(user) => user,
        Err(e) if e.is_rate_limited() => return Err(e.into()),
        Err(e) => {
            tracing::debug!("[Info] Could not resolve {:?}: {}", query, e);
            ctx.reply(&event, &ResponseMapper::escape_html(&e.to_string()))
                .await?;
            return Ok(());
        }
    };

    if !user.is_user {
        let label = match &user.username {
            Some(username) => format!("@{}", username),
            None => user.id.to_string(),
        };
        ctx.reply(&event, &format!("{} is not a User", ResponseMapper::code(&label)))
            .await?;
        return Ok(());
    }

    let reply_to = event.replied_message_id.unwrap_or(event.message_id);
    ctx.backend
        .send_message(
            event.origin_channel_id,
            &ResponseMapper::format_user_info(&user),
            Some(reply_to),
        )
        .await?;
    Ok(())
}

async fn exec(ctx: CommandContext, event: InboundEvent) -> AppResult<()> {
    let code = event.argument().to_string();
    if code.is_empty() {
        ctx.edit(&event, "<b>Usage:</b> <code>.exec &lt;code&gt;</code>")
            .await?;
        return Ok(());
    }

    let command = CommandLine::program(ctx.config.exec.interpreter.clone(), ["-c", code.as_str()]);
    let reserved = visible_len(&ResponseMapper::exec_result(&code, "Result", ""));
    let report = ctx
        .controller
        .execute(
            &command,
            ExecMode::Local,
            StreamingPolicy::Buffered,
            reserved,
            &mut NullSink,
        )
        .await?;

    if report.is_truncated() {
        let caption = ResponseMapper::code(&ResponseMapper::truncate(&code, CAPTION_LIMIT - 16));
        let file = OutgoingFile::new(RESULT_FILE_NAME, report.output.full_output().into_bytes())
            .with_caption(caption);
        ctx.send_file(&event, file, Some(event.message_id)).await?;
        return Ok(());
    }

    let body = report.output.content();
    let text = match report.termination {
        Termination::DeadlineKilled => format!(
            "{}\n\n<b>Process killed:</b> <code>{}</code>",
            ResponseMapper::exec_result(&code, "Result", body),
            KillReason::TimeLimit
        ),
        Termination::Completed { exit_code } => {
            if body.trim().is_empty() && exit_code == Some(0) {
                "Did you forget to output something?".to_string()
            } else if exit_code == Some(0) {
                ResponseMapper::exec_result(&code, "Result", body)
            } else {
                ResponseMapper::exec_result(&code, "Error", body)
            }
        }
        Termination::SizeLimitKilled | Termination::Cancelled => return Ok(()),
    };
    ctx.edit(&event, &text).await?;
    Ok(())
}

async fn sendlog(ctx: CommandContext, event: InboundEvent) -> AppResult<()> {
    let logs_dir = ctx.config.logs_dir.clone();
    let has_logs = match std::fs::read_dir(&logs_dir) {
        Ok(mut entries) => entries.next().is_some(),
        Err(_) => false,
    };
    if !has_logs {
        ctx.edit(&event, "<code>There are no logs saved!</code>").await?;
        return Ok(());
    }
    let mut live = LiveMessage::of(&event);
    send_from_disk(&ctx, &mut live, &logs_dir, ctx.config.max_upload_bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use crate::models::settings::AppConfig;
    use chat_companion_core::UserRecord;

    fn user(id: i64, username: &str, is_user: bool) -> UserRecord {
        UserRecord {
            id,
            first_name: format!("User {}", id),
            last_name: None,
            username: Some(username.to_string()),
            bio: None,
            common_chats_count: None,
            avatar: None,
            is_user,
            is_self: false,
        }
    }

    fn event(text: &str, arg: &str) -> InboundEvent {
        let mut event = InboundEvent::outgoing(3, 30, text).with_groups(vec![arg.to_string()]);
        event.sender_id = 1;
        event
    }

    fn sh_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.exec.interpreter = "sh".to_string();
        config.exec.deadline_secs = 3;
        config
    }

    #[test]
    fn test_info_target_precedence() {
        let mut ev = event(".info @bob", " @bob");
        ev.replied_sender_id = Some(7);
        assert_eq!(info_target(&ev).unwrap(), UserQuery::Handle("bob".to_string()));

        let mut ev = event(".info", "");
        ev.replied_sender_id = Some(7);
        assert_eq!(info_target(&ev).unwrap(), UserQuery::Id(7));

        assert_eq!(info_target(&event(".info", "")).unwrap(), UserQuery::Id(1));
        assert!(info_target(&event(".info @", "@")).is_err());
    }

    #[tokio::test]
    async fn test_version_mentions_library() {
        let (ctx, backend) = context(AppConfig::default());
        version(ctx, event(".version", "")).await.unwrap();
        let text = backend.last_edit_of(30).unwrap();
        assert!(text.contains(env!("CARGO_PKG_VERSION")));
        assert!(text.contains(LIBRARY_NAME));
    }

    #[tokio::test]
    async fn test_info_replies_with_user_card() {
        let (ctx, backend) = context(AppConfig::default());
        backend.add_user(user(5, "alice", true));
        info(ctx, event(".info 5", "5")).await.unwrap();

        let sent = backend.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.starts_with("<b>User Info:</b>"));
        assert!(sent[0].1.contains("Username: @alice"));
        assert_eq!(sent[0].2, Some(30));
    }

    #[tokio::test]
    async fn test_info_rejects_non_users() {
        let (ctx, backend) = context(AppConfig::default());
        backend.add_user(user(-100, "news", false));
        info(ctx, event(".info @news", "@news")).await.unwrap();
        assert_eq!(backend.sent()[0].1, "<code>@news</code> is not a User");
    }

    #[tokio::test]
    async fn test_info_resolution_failure_is_inline() {
        let (ctx, backend) = context(AppConfig::default());
        info(ctx, event(".info @ghost", "@ghost")).await.unwrap();
        assert!(backend.sent()[0].1.starts_with("Not found:"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_result() {
        let (ctx, backend) = context(sh_config());
        exec(ctx, event(".exec echo $((1+1))", "echo $((1+1))"))
            .await
            .unwrap();
        let text = backend.last_edit_of(30).unwrap();
        assert!(text.contains("<b>Result:</b>\n<pre>2\n</pre>"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_error_label() {
        let (ctx, backend) = context(sh_config());
        exec(ctx, event(".exec echo bad >&2; exit 3", "echo bad >&2; exit 3"))
            .await
            .unwrap();
        let text = backend.last_edit_of(30).unwrap();
        assert!(text.contains("<b>Error:</b>\n<pre>bad\n</pre>"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_without_output() {
        let (ctx, backend) = context(sh_config());
        exec(ctx, event(".exec true", "true")).await.unwrap();
        assert_eq!(
            backend.last_edit_of(30).as_deref(),
            Some("Did you forget to output something?")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_large_output_sent_as_file() {
        let (ctx, backend) = context(sh_config());
        exec(ctx, event(".exec seq 1 3000", "seq 1 3000")).await.unwrap();

        let files = backend.files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, RESULT_FILE_NAME);
        assert_eq!(files[0].caption.as_deref(), Some("<code>seq 1 3000</code>"));
        let content = String::from_utf8(files[0].data.clone()).unwrap();
        assert!(content.starts_with("1\n2\n"));
        assert!(content.ends_with("3000\n"));
        assert!(backend.edits().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_endless_output_is_cut() {
        let mut config = sh_config();
        config.exec.output_limit_bytes = 5000;
        let (ctx, backend) = context(config);
        let started = std::time::Instant::now();
        exec(ctx, event(".exec yes", "yes")).await.unwrap();

        assert!(started.elapsed() < std::time::Duration::from_secs(3));
        let files = backend.files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, RESULT_FILE_NAME);
        assert!(files[0].data.len() <= 5000);
        assert!(files[0].data.starts_with(b"y\ny\n"));
    }

    #[tokio::test]
    async fn test_sendlog_without_logs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.logs_dir = dir.path().join("missing");
        let (ctx, backend) = context(config);
        sendlog(ctx, event(".sendlog", "")).await.unwrap();
        assert_eq!(
            backend.last_edit_of(30).as_deref(),
            Some("<code>There are no logs saved!</code>")
        );
    }

    #[tokio::test]
    async fn test_sendlog_zips_logs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("01_Command_term.log"), "trace").unwrap();
        let mut config = AppConfig::default();
        config.logs_dir = dir.path().to_path_buf();
        let (ctx, backend) = context(config);
        sendlog(ctx, event(".sendlog", "")).await.unwrap();

        let files = backend.files();
        assert_eq!(files.len(), 1);
        assert!(files[0].file_name.ends_with(".zip"));
        assert_eq!(backend.deleted(), vec![30]);
    }
}
