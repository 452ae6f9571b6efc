use sumdays_core::{Error, Memo};

use crate::cli::MemoCommands;
use crate::commands::common::{
    capture_editor_input_with_initial, format_memo_lines, normalize_content, print_json,
    resolve_content, resolve_date, CommandContext,
};
use crate::error::CliError;

pub async fn run_memo(command: MemoCommands, ctx: &CommandContext) -> Result<(), CliError> {
    match command {
        MemoCommands::Add { content, date } => run_add(&content, date, ctx).await,
        MemoCommands::List { date, all } => run_list(date, all, ctx).await,
        MemoCommands::Edit { id, content } => run_edit(id, &content, ctx).await,
        MemoCommands::Delete { id } => run_delete(id, ctx).await,
    }
}

async fn run_add(
    content_parts: &[String],
    date: Option<String>,
    ctx: &CommandContext,
) -> Result<(), CliError> {
    let date = resolve_date(date)?;
    let content = resolve_content(content_parts)?;

    let store = ctx.open_store().await?;
    let memo = store.create_memo(&content, &date).await?;

    if ctx.json {
        return print_json(&memo);
    }
    println!("{}", memo.id);
    Ok(())
}

async fn run_list(date: Option<String>, all: bool, ctx: &CommandContext) -> Result<(), CliError> {
    let store = ctx.open_store().await?;
    let memos = if all {
        store.live_query::<Memo>().await?
    } else {
        store.memos_on(&resolve_date(date)?).await?
    };

    if ctx.json {
        return print_json(&memos);
    }
    if memos.is_empty() {
        println!("No memos.");
        return Ok(());
    }
    for line in format_memo_lines(&memos) {
        println!("{line}");
    }
    Ok(())
}

async fn run_edit(id: i64, content_parts: &[String], ctx: &CommandContext) -> Result<(), CliError> {
    let store = ctx.open_store().await?;
    let mut memo = store
        .get::<Memo>(&id)
        .await?
        .ok_or(CliError::MemoNotFound(id))?;

    let content = match normalize_content(&content_parts.join(" ")) {
        Some(content) => content,
        None => capture_editor_input_with_initial(&memo.content)?
            .ok_or(CliError::EmptyEditedContent)?,
    };
    if content == memo.content {
        println!("{}", memo.id);
        return Ok(());
    }

    memo.content = content;
    store.update(&memo).await?;

    if ctx.json {
        return print_json(&memo);
    }
    println!("{}", memo.id);
    Ok(())
}

async fn run_delete(id: i64, ctx: &CommandContext) -> Result<(), CliError> {
    let store = ctx.open_store().await?;
    match store.soft_delete::<Memo>(&id).await {
        Ok(()) => {
            println!("{id}");
            Ok(())
        }
        Err(Error::NotFound(_)) => Err(CliError::MemoNotFound(id)),
        Err(error) => Err(error.into()),
    }
}
