use sumdays_core::util::normalize_text_option;
use sumdays_core::{DailyEntry, Error};

use crate::cli::DiaryCommands;
use crate::commands::common::{print_json, resolve_content, resolve_date, CommandContext};
use crate::error::CliError;

pub async fn run_diary(command: DiaryCommands, ctx: &CommandContext) -> Result<(), CliError> {
    match command {
        DiaryCommands::Write {
            text,
            date,
            keywords,
            emotion_score,
            photo_urls,
        } => {
            let date = resolve_date(date)?;
            let text = resolve_content(&text)?;
            if let Some(score) = emotion_score {
                if !(-1.0..=1.0).contains(&score) {
                    return Err(CliError::InvalidEmotionScore(score));
                }
            }

            let store = ctx.open_store().await?;
            let mut entry = store
                .get::<DailyEntry>(&date)
                .await?
                .unwrap_or_else(|| DailyEntry::new(date.clone()));
            entry.diary = Some(text);
            if let Some(keywords) = normalize_text_option(keywords) {
                entry.keywords = Some(keywords);
            }
            if emotion_score.is_some() {
                entry.emotion_score = emotion_score;
            }
            if !photo_urls.is_empty() {
                entry.photo_urls = photo_urls;
            }
            store.update(&entry).await?;

            if ctx.json {
                return print_json(&entry);
            }
            println!("{}", entry.date);
            Ok(())
        }
        DiaryCommands::Show { date } => {
            let date = resolve_date(date)?;
            let store = ctx.open_store().await?;
            let entry = store
                .get::<DailyEntry>(&date)
                .await?
                .ok_or_else(|| CliError::EntryNotFound(date.clone()))?;

            if ctx.json {
                return print_json(&entry);
            }
            print!("{}", format_entry(&entry));
            Ok(())
        }
        DiaryCommands::Delete { date } => {
            let date = resolve_date(Some(date))?;
            let store = ctx.open_store().await?;
            match store.soft_delete::<DailyEntry>(&date).await {
                Ok(()) => {
                    println!("{date}");
                    Ok(())
                }
                Err(Error::NotFound(_)) => Err(CliError::EntryNotFound(date)),
                Err(error) => Err(error.into()),
            }
        }
    }
}

pub fn format_entry(entry: &DailyEntry) -> String {
    let mut out = format!("{}\n", entry.date);
    let keywords = entry.keyword_list();
    if !keywords.is_empty() {
        out.push_str(&format!("keywords: {}\n", keywords.join(", ")));
    }
    if let Some(score) = entry.emotion_score {
        out.push_str(&format!("emotion:  {score:+.2}\n"));
    }
    for url in &entry.photo_urls {
        out.push_str(&format!("photo:    {url}\n"));
    }
    if let Some(comment) = entry.ai_comment.as_deref() {
        out.push_str(&format!("comment:  {comment}\n"));
    }
    out.push('\n');
    match entry.diary.as_deref() {
        Some(diary) if entry.has_diary() => out.push_str(diary),
        _ => out.push_str("(no diary written yet)"),
    }
    out.push('\n');
    out
}
