use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use url::Url;

mod config;
mod db;
mod error;
mod models;

use config::Config;
use db::Repository;
use models::{
    read_time_from_text, slugify, ContentUpdate, Highlight, Link, LinkQuery, NewHighlight,
    NewLink, ReadState, SearchClause, SortOrder, Tag,
};

#[derive(Parser)]
#[command(name = "linkstash", version, about = "A personal read-it-later link library")]
struct Cli {
    /// Act as this user (defaults to the configured default_user)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save a URL to the library
    Add {
        url: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        excerpt: Option<String>,
        /// Plain-text article body; drives the read-time estimate
        #[arg(long)]
        text: Option<String>,
        /// Skip the configured default tags
        #[arg(long)]
        no_default_tags: bool,
    },
    /// List saved links
    List {
        /// Only links carrying this tag (by name or slug)
        #[arg(long)]
        tag: Option<String>,
        /// Only links from this hostname
        #[arg(long)]
        host: Option<String>,
        /// Only links whose title contains this text
        #[arg(long)]
        title_contains: Option<String>,
        #[arg(long, conflicts_with = "read")]
        unread: bool,
        #[arg(long)]
        read: bool,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long)]
        page_size: Option<i64>,
        #[arg(long, value_enum, default_value = "newest")]
        sort: SortArg,
        #[arg(long)]
        json: bool,
    },
    /// Show one link and mark it viewed
    View {
        id: i64,
        /// Do not update the last-viewed timestamp
        #[arg(long)]
        no_touch: bool,
        #[arg(long)]
        json: bool,
    },
    /// Open a link in the browser and mark it viewed
    Open { id: i64 },
    /// Update a link's stored content after a re-fetch or manual edit
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        excerpt: Option<String>,
        /// New plain-text body; refreshes the read-time estimate
        #[arg(long)]
        text: Option<String>,
    },
    /// Delete a link (its tags survive)
    Rm { id: i64 },
    /// Store a summary produced elsewhere for a link
    Summary {
        id: i64,
        text: String,
        #[arg(long, default_value = "manual")]
        model: String,
    },
    /// Save an archive snapshot for a link
    Archive {
        id: i64,
        #[arg(long)]
        content: Option<String>,
    },
    /// Manage tags
    #[command(subcommand)]
    Tag(TagCommand),
    /// Manage highlights
    #[command(subcommand)]
    Highlight(HighlightCommand),
}

#[derive(Subcommand)]
enum TagCommand {
    /// List tags with link counts
    Ls,
    /// Attach tags to a link, creating them on demand
    Add {
        link_id: i64,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Detach tags from a link
    Rm {
        link_id: i64,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Replace a link's tags with exactly this set (no names clears them)
    Set {
        link_id: i64,
        names: Vec<String>,
    },
    /// Delete a tag and detach it from every link
    Delete { name: String },
}

#[derive(Subcommand)]
enum HighlightCommand {
    /// Record a highlighted passage on a link
    Add {
        link_id: i64,
        start: i64,
        end: i64,
        text: String,
    },
    /// List a link's highlights
    Ls { link_id: i64 },
    /// Delete a highlight
    Rm { id: i64 },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Newest,
    Oldest,
    Title,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let repository = Repository::new(&config.db_path).await?;

    let username = cli.user.clone().unwrap_or_else(|| config.default_user.clone());
    let owner = repository.ensure_user(&username).await?;

    match cli.command {
        Command::Add {
            url,
            title,
            author,
            excerpt,
            text,
            no_default_tags,
        } => {
            let link = build_new_link(&url, title, author, excerpt, text)?;
            let link = repository.insert_link(owner, link).await?;

            if !no_default_tags && !config.default_tags.is_empty() {
                let mut tag_ids = Vec::new();
                for name in &config.default_tags {
                    tag_ids.push(repository.create_or_get_tag(owner, name).await?.id);
                }
                repository.add_tags(owner, link.id, tag_ids).await?;
            }
            println!("Saved link {} ({})", link.id, link.cleaned_url);
        }

        Command::List {
            tag,
            host,
            title_contains,
            unread,
            read,
            page,
            page_size,
            sort,
            json,
        } => {
            let mut query = LinkQuery::for_owner(owner);
            query.page = page;
            query.page_size = page_size.unwrap_or(config.page_size);
            query.order = match sort {
                SortArg::Newest => SortOrder::NewestFirst,
                SortArg::Oldest => SortOrder::OldestFirst,
                SortArg::Title => SortOrder::Title,
            };
            if let Some(tag_name) = tag {
                let slug = slugify(&tag_name);
                match repository.get_tag_by_slug(owner, &slug).await? {
                    Some(tag) => query.tag_id = Some(tag.id),
                    None => bail!("no such tag: {tag_name}"),
                }
            }
            if let Some(host) = host {
                query.clauses.push(SearchClause::Hostname(host));
            }
            if let Some(needle) = title_contains {
                query.clauses.push(SearchClause::TitleContains(needle));
            }
            if unread {
                query.clauses.push(SearchClause::ReadState(ReadState::Unread));
            } else if read {
                query.clauses.push(SearchClause::ReadState(ReadState::Viewed));
            }

            let result = repository.list_links(query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                for item in &result.items {
                    let unread_marker = if item.last_viewed_at.is_none() { "*" } else { " " };
                    let archive_marker = if item.has_archive { "@" } else { " " };
                    let read_time = item.read_time_display.as_deref().unwrap_or("");
                    println!(
                        "{:>5} {}{} {}  [{}] {}",
                        item.id, unread_marker, archive_marker, item.title, item.hostname, read_time
                    );
                }
                println!(
                    "Page {} of {} ({} links)",
                    result.page, result.page_count, result.total_count
                );
            }
        }

        Command::View { id, no_touch, json } => {
            let link = if no_touch {
                repository.get_link(owner, id).await?
            } else {
                repository.mark_viewed(owner, id).await?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&link)?);
            } else {
                let tags = repository.list_tags_for_link(owner, id).await?;
                let highlights = repository.list_highlights(owner, id).await?;
                let archived = repository.has_archive(owner, id).await?;
                print_link(&link, &tags, &highlights, archived);
            }
        }

        Command::Open { id } => {
            let link = repository.get_link(owner, id).await?;
            open::that(&link.cleaned_url)
                .with_context(|| format!("failed to open {}", link.cleaned_url))?;
            repository.mark_viewed(owner, id).await?;
            println!("Opened {}", link.cleaned_url);
        }

        Command::Edit {
            id,
            title,
            author,
            excerpt,
            text,
        } => {
            let current = repository.get_link(owner, id).await?;
            let (read_time_seconds, read_time_display) = match &text {
                Some(text) => {
                    let (seconds, display) = read_time_from_text(text);
                    (Some(seconds), Some(display))
                }
                None => (current.read_time_seconds, current.read_time_display.clone()),
            };
            let update = ContentUpdate {
                title: title.unwrap_or(current.title),
                author: author.or(current.author),
                excerpt: excerpt.or(current.excerpt),
                article_html: current.article_html,
                raw_text_content: text.or(current.raw_text_content),
                header_image_url: current.header_image_url,
                article_date: current.article_date,
                read_time_seconds,
                read_time_display,
            };
            let link = repository.update_content(owner, id, update).await?;
            println!("Updated link {}", link.id);
        }

        Command::Rm { id } => {
            repository.delete_link(owner, id).await?;
            println!("Deleted link {id}");
        }

        Command::Summary { id, text, model } => {
            repository.set_summary(owner, id, text, model).await?;
            println!("Stored summary for link {id}");
        }

        Command::Archive { id, content } => {
            repository.set_archive(owner, id, content).await?;
            println!("Archived link {id}");
        }

        Command::Tag(tag_command) => run_tag_command(&repository, owner, tag_command).await?,

        Command::Highlight(highlight_command) => {
            run_highlight_command(&repository, owner, highlight_command).await?
        }
    }

    Ok(())
}

async fn run_tag_command(
    repository: &Repository,
    owner: i64,
    command: TagCommand,
) -> anyhow::Result<()> {
    match command {
        TagCommand::Ls => {
            for tag in repository.list_tags(owner).await? {
                println!("{}  ({})  {} links", tag.name, tag.slug, tag.link_count);
            }
        }

        TagCommand::Add { link_id, names } => {
            let mut tag_ids = Vec::new();
            for name in &names {
                tag_ids.push(repository.create_or_get_tag(owner, name).await?.id);
            }
            repository.add_tags(owner, link_id, tag_ids).await?;
            print_link_tags(repository, owner, link_id).await?;
        }

        TagCommand::Rm { link_id, names } => {
            let mut tag_ids = Vec::new();
            for name in &names {
                match repository.get_tag_by_slug(owner, &slugify(name)).await? {
                    Some(tag) => tag_ids.push(tag.id),
                    // Removal is idempotent; unknown names have nothing to detach.
                    None => eprintln!("no such tag: {name}"),
                }
            }
            repository.remove_tags(owner, link_id, tag_ids).await?;
            print_link_tags(repository, owner, link_id).await?;
        }

        TagCommand::Set { link_id, names } => {
            let mut tag_ids = Vec::new();
            for name in &names {
                tag_ids.push(repository.create_or_get_tag(owner, name).await?.id);
            }
            repository.replace_tags(owner, link_id, tag_ids).await?;
            print_link_tags(repository, owner, link_id).await?;
        }

        TagCommand::Delete { name } => {
            match repository.get_tag_by_slug(owner, &slugify(&name)).await? {
                Some(tag) => {
                    repository.delete_tag(owner, tag.id).await?;
                    println!("Deleted tag {}", tag.name);
                }
                None => bail!("no such tag: {name}"),
            }
        }
    }
    Ok(())
}

async fn run_highlight_command(
    repository: &Repository,
    owner: i64,
    command: HighlightCommand,
) -> anyhow::Result<()> {
    match command {
        HighlightCommand::Add {
            link_id,
            start,
            end,
            text,
        } => {
            let highlight = repository
                .add_highlight(
                    owner,
                    link_id,
                    NewHighlight {
                        start_index: start,
                        end_index: end,
                        highlighted_text: text,
                    },
                )
                .await?;
            println!("Added highlight {} to link {link_id}", highlight.id);
        }

        HighlightCommand::Ls { link_id } => {
            for highlight in repository.list_highlights(owner, link_id).await? {
                println!(
                    "{:>5} [{}..{}] {}",
                    highlight.id,
                    highlight.start_index,
                    highlight.end_index,
                    highlight.highlighted_text
                );
            }
        }

        HighlightCommand::Rm { id } => {
            repository.delete_highlight(owner, id).await?;
            println!("Deleted highlight {id}");
        }
    }
    Ok(())
}

fn build_new_link(
    raw_url: &str,
    title: Option<String>,
    author: Option<String>,
    excerpt: Option<String>,
    text: Option<String>,
) -> anyhow::Result<NewLink> {
    let parsed = Url::parse(raw_url).with_context(|| format!("invalid URL: {raw_url}"))?;
    let hostname = parsed
        .host_str()
        .with_context(|| format!("URL has no hostname: {raw_url}"))?
        .to_string();

    // Tracking fragments never belong in the stored URL.
    let mut cleaned = parsed.clone();
    cleaned.set_fragment(None);

    let (read_time_seconds, read_time_display) = match &text {
        Some(text) => {
            let (seconds, display) = read_time_from_text(text);
            (Some(seconds), Some(display))
        }
        None => (None, None),
    };

    Ok(NewLink {
        original_url: raw_url.to_string(),
        cleaned_url: cleaned.to_string(),
        title: title.unwrap_or_else(|| hostname.clone()),
        hostname,
        author,
        excerpt,
        raw_text_content: text,
        read_time_seconds,
        read_time_display,
        ..Default::default()
    })
}

async fn print_link_tags(
    repository: &Repository,
    owner: i64,
    link_id: i64,
) -> anyhow::Result<()> {
    let tags = repository.list_tags_for_link(owner, link_id).await?;
    let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
    println!("Link {link_id} tags: {}", names.join(", "));
    Ok(())
}

fn print_link(link: &Link, tags: &[Tag], highlights: &[Highlight], archived: bool) {
    println!("{}  [{}]", link.title, link.hostname);
    println!("  {}", link.cleaned_url);
    if let Some(author) = &link.author {
        println!("  by {author}");
    }
    if let Some(read_time) = &link.read_time_display {
        println!("  {read_time}");
    }
    println!("  saved {}", link.saved_at.format("%Y-%m-%d %H:%M"));
    if link.is_unread() {
        println!("  unread");
    } else if let Some(viewed) = &link.last_viewed_at {
        println!("  viewed {}", viewed.format("%Y-%m-%d %H:%M"));
    }
    if archived {
        println!("  archived");
    }
    if !tags.is_empty() {
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        println!("  tags: {}", names.join(", "));
    }
    if let Some(excerpt) = &link.excerpt {
        println!("\n{excerpt}");
    }
    if let Some(summary) = &link.summary {
        println!("\nSummary:\n{summary}");
    }
    for highlight in highlights {
        println!("\n> {}", highlight.highlighted_text);
    }
}
