//! Terminal Commands
//!
//! `.term` and `.rterm` stream a shell command's output into the triggering
//! message; `.upload` and `.rupload` send files from the local or remote
//! host.

use std::path::Path;
use std::time::Duration;

use chat_companion_core::InboundEvent;

use crate::models::settings::StreamingPolicy;
use crate::services::exec::{CommandLine, ExecMode, StreamingReporter};
use crate::services::remote::registry::CommandRegistry;
use crate::services::remote::response_mapper::ResponseMapper;
use crate::services::remote::types::{CommandContext, CommandFuture, CommandSpec, LiveMessage};
use crate::services::upload::send_from_disk;
use crate::utils::error::{AppError, AppResult};

pub const MODULE: &str = "terminals";

pub fn register(registry: &mut CommandRegistry, ssh_enabled: bool) {
    registry.register(
        CommandSpec::new("term", term_handler)
            .with_help("Run a shell command and stream its output: .term <command>")
            .with_edits(true)
            .in_module(MODULE),
    );
    registry.register(
        CommandSpec::new("upload", upload_handler)
            .with_help("Upload a file, or a folder as a zip: .upload <path>")
            .in_module(MODULE),
    );

    if ssh_enabled {
        registry.register(
            CommandSpec::new("rterm", rterm_handler)
                .with_help("Run a shell command on the SSH host: .rterm <command>")
                .with_edits(true)
                .in_module(MODULE),
        );
        registry.register(
            CommandSpec::new("rupload", rupload_handler)
                .with_help("Upload a file from the SSH host: .rupload <path>")
                .in_module(MODULE),
        );
    }
}

fn term_handler(ctx: CommandContext, event: InboundEvent) -> CommandFuture {
    Box::pin(run_terminal(ctx, event, ExecMode::Local))
}

fn rterm_handler(ctx: CommandContext, event: InboundEvent) -> CommandFuture {
    Box::pin(run_terminal(ctx, event, ExecMode::Remote))
}

fn upload_handler(ctx: CommandContext, event: InboundEvent) -> CommandFuture {
    Box::pin(upload(ctx, event))
}

fn rupload_handler(ctx: CommandContext, event: InboundEvent) -> CommandFuture {
    Box::pin(rupload(ctx, event))
}

fn throttle_of(policy: StreamingPolicy) -> Duration {
    match policy {
        StreamingPolicy::Incremental { throttle_ms } => Duration::from_millis(throttle_ms),
        StreamingPolicy::Buffered => Duration::ZERO,
    }
}

async fn run_terminal(ctx: CommandContext, event: InboundEvent, mode: ExecMode) -> AppResult<()> {
    let command = event.argument().to_string();
    if command.is_empty() {
        ctx.edit(&event, "<b>Usage:</b> <code>.term &lt;command&gt;</code>")
            .await?;
        return Ok(());
    }

    let endpoint = match mode {
        ExecMode::Local => None,
        ExecMode::Remote => Some(
            ctx.controller
                .remote()
                .map(|remote| remote.endpoint())
                .ok_or_else(|| AppError::connection("Remote execution is not configured"))?,
        ),
    };

    let policy = ctx.config.exec.streaming;
    let mut reporter = StreamingReporter::open(
        ctx.backend.clone(),
        event.origin_channel_id,
        event.message_id,
        ResponseMapper::terminal_header(&command, endpoint.as_deref()),
        command.clone(),
        throttle_of(policy),
    )
    .await?;

    let reserved = reporter.reserved_len();
    let report = ctx
        .controller
        .execute(
            &CommandLine::shell(command.as_str()),
            mode,
            policy,
            reserved,
            &mut reporter,
        )
        .await?;
    tracing::info!(
        "[Exec] '{}' ended with {:?} after {:?}",
        command,
        report.termination,
        report.elapsed()
    );

    reporter.finish(&report).await
}

async fn upload(ctx: CommandContext, event: InboundEvent) -> AppResult<()> {
    let target = event.argument().to_string();
    if target.is_empty() {
        ctx.edit(&event, "<b>Usage:</b> <code>.upload &lt;path&gt;</code>")
            .await?;
        return Ok(());
    }
    let mut live = LiveMessage::of(&event);
    send_from_disk(&ctx, &mut live, Path::new(&target), ctx.config.max_upload_bytes).await
}

async fn rupload(ctx: CommandContext, event: InboundEvent) -> AppResult<()> {
    let target = event.argument().to_string();
    if target.is_empty() {
        ctx.edit(&event, "<b>Usage:</b> <code>.rupload &lt;path&gt;</code>")
            .await?;
        return Ok(());
    }
    let remote = ctx
        .controller
        .remote()
        .cloned()
        .ok_or_else(|| AppError::connection("Remote execution is not configured"))?;

    let mut live = LiveMessage::of(&event);
    live.show(&ctx, "<code>Connecting...</code>").await?;
    if !remote.file_exists(&target).await? {
        live.show(
            &ctx,
            &format!("<i>File Not Found</i>: {}", ResponseMapper::code(&target)),
        )
        .await?;
        return Ok(());
    }

    live.show(&ctx, "<code>Downloading...</code>").await?;
    let staging = tempfile::tempdir()?;
    let file_name = Path::new(&target)
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "download".into());
    let local = staging.path().join(file_name);
    remote.fetch_file(&target, &local).await?;
    tracing::info!("[Upload] Fetched {} from {}", target, remote.endpoint());

    send_from_disk(&ctx, &mut live, &local, ctx.config.max_upload_bytes).await
}
