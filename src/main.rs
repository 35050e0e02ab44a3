use std::fmt::Write as _;
use std::io::Write as _;
use std::path::PathBuf;
use std::{env, fs, io};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use spdlog::warn;

use vacatad_cms::config::{read_config, Config};
use vacatad_cms::draft::read_draft;
use vacatad_cms::logger::configure_logger;
use vacatad_cms::media;
use vacatad_cms::media::{HttpFetcher, StockLibrary};
use vacatad_cms::post::PostRecord;
use vacatad_cms::session::Session;
use vacatad_cms::store::GitHubStore;
use vacatad_cms::text_utils::{parse_post_date, slugify};
use vacatad_cms::view::DEFAULT_POST_TEMPLATE;

const CONFIG_FILE: &str = "vacatad-cms.toml";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file. Defaults to vacatad-cms.toml next to the
    /// executable, then to the user configuration directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the posts of the index, most recent first
    List,
    /// Scaffold a local draft file for a new post
    New {
        /// Title of the post
        #[arg(short, long)]
        title: String,
    },
    /// Publish a draft: hero image, standalone document, index entry
    Publish {
        /// Draft TOML file
        #[arg(short, long)]
        draft: PathBuf,
    },
    /// Download an existing post into local draft files for editing
    Pull {
        /// Id of the post, as shown by list
        #[arg(short, long)]
        id: i64,
        /// Directory receiving the draft files
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Remove a post from the index and blank its files
    Delete {
        /// Id of the post, as shown by list
        #[arg(short, long)]
        id: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Media library operations
    Images {
        #[command(subcommand)]
        command: ImagesCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ImagesCommand {
    /// List the images of the repository image folder
    List,
    /// Upload a local image into the repository image folder
    Upload {
        /// Image file to upload
        file: PathBuf,
    },
    /// Search stock photos (requires the [unsplash] config section)
    Search {
        /// Free-text query
        query: String,
    },
}

fn config_path(args: &Args) -> PathBuf {
    if let Some(ref path) = args.config {
        return path.clone();
    }

    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.exists() {
                return candidate;
            }
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join("vacatad-cms").join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

fn load_template(config: &Config) -> Result<String> {
    match config.paths.template_dir {
        Some(ref dir) => {
            let path = dir.join("post.tpl");
            fs::read_to_string(&path)
                .with_context(|| format!("Error loading post template {}", path.display()))
        }
        None => Ok(DEFAULT_POST_TEMPLATE.to_string()),
    }
}

fn open_store(config: &Config) -> Result<GitHubStore> {
    let token = env::var(&config.github.token_env)
        .with_context(|| format!("The {} environment variable must hold a GitHub token", config.github.token_env))?;

    let store = GitHubStore::new(&config.github.owner, &config.github.repo, &config.github.branch, &token)?;
    Ok(store)
}

async fn open_session(config: &Config) -> Result<Session<GitHubStore, HttpFetcher>> {
    let store = open_store(config)?;
    let fetcher = HttpFetcher::new()?;
    let template_src = load_template(config)?;

    let mut session = Session::new(store, fetcher, config.site_paths(), template_src);
    session.load().await?;
    Ok(session)
}

fn toml_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn render_draft(record: &PostRecord, body_file: &str) -> String {
    let mut buf = String::new();

    let _ = writeln!(&mut buf, "id = {}", record.id);
    let _ = writeln!(&mut buf, "title = \"{}\"", toml_escape(&record.title));
    if let Some(ref slug) = record.slug {
        let _ = writeln!(&mut buf, "slug = \"{}\"", toml_escape(slug));
    }
    // Legacy dates are normalized so the draft parses as a TOML date
    let date = parse_post_date(&record.date)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| record.date.clone());
    let _ = writeln!(&mut buf, "date = {}", date);
    let _ = writeln!(&mut buf, "excerpt = \"{}\"", toml_escape(&record.excerpt));
    let _ = writeln!(&mut buf, "image = \"{}\"", toml_escape(&record.image));
    if let Some(ref alt) = record.image_alt {
        let _ = writeln!(&mut buf, "image_alt = \"{}\"", toml_escape(alt));
    }
    let tags: Vec<String> = record.tags.iter().map(|t| format!("\"{}\"", toml_escape(t))).collect();
    let _ = writeln!(&mut buf, "tags = [{}]", tags.join(", "));
    let _ = writeln!(&mut buf, "featured = {}", record.featured);
    if let Some(ref read_time) = record.read_time {
        let _ = writeln!(&mut buf, "read_time = \"{}\"", toml_escape(read_time));
    }
    let _ = writeln!(&mut buf, "body_file = \"{}\"", toml_escape(body_file));
    if let Some(ref author) = record.author {
        let _ = writeln!(&mut buf);
        let _ = writeln!(&mut buf, "[author]");
        let _ = writeln!(&mut buf, "name = \"{}\"", toml_escape(&author.name));
        let _ = writeln!(&mut buf, "role = \"{}\"", toml_escape(&author.role));
    }

    buf
}

fn scaffold_draft(title: &str) -> Result<()> {
    let slug = slugify(title);
    if slug.is_empty() {
        bail!("The title does not produce a usable slug");
    }

    let draft_path = PathBuf::from(format!("{}.toml", slug));
    let body_path = PathBuf::from(format!("{}.html", slug));
    if draft_path.exists() || body_path.exists() {
        bail!("Draft files for {} already exist here", slug);
    }

    let mut buf = String::new();
    let _ = writeln!(&mut buf, "title = \"{}\"", toml_escape(title));
    let _ = writeln!(&mut buf, "slug = \"{}\"", slug);
    let _ = writeln!(&mut buf, "date = {}", chrono::Utc::now().format("%Y-%m-%d"));
    let _ = writeln!(&mut buf, "excerpt = \"\"");
    let _ = writeln!(&mut buf, "image = \"\"");
    let _ = writeln!(&mut buf, "tags = []");
    let _ = writeln!(&mut buf, "featured = false");
    let _ = writeln!(&mut buf, "read_time = \"5 min read\"");
    let _ = writeln!(&mut buf, "body_file = \"{}.html\"", slug);
    let _ = writeln!(&mut buf);
    let _ = writeln!(&mut buf, "[author]");
    let _ = writeln!(&mut buf, "name = \"VacatAd Team\"");
    let _ = writeln!(&mut buf, "role = \"\"");

    fs::write(&draft_path, buf)?;
    fs::write(&body_path, "<p>Replace with your opening paragraph.</p>\n<h2>First section</h2>\n")?;

    println!("Created {} and {}", draft_path.display(), body_path.display());
    println!("Fill them in, set the hero image, then run: vacatad-cms publish --draft {}", draft_path.display());
    Ok(())
}

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

async fn list_cmd(config: &Config) -> Result<()> {
    let session = open_session(config).await?;

    let posts = session.sorted_for_display();
    if posts.is_empty() {
        println!("No posts found.");
        return Ok(());
    }

    for post in posts {
        println!("{:>15}  {:<12}  {}", post.id, post.date, post.title);
    }
    Ok(())
}

async fn publish_cmd(config: &Config, draft_path: &PathBuf) -> Result<()> {
    let draft = read_draft(draft_path)?;
    let is_new = draft.id.is_none();

    let mut session = open_session(config).await?;
    let record = session.save(&draft).await?;

    println!("Saved \"{}\" ({})", record.title, record.date);
    if is_new {
        println!("Add id = {} to the draft to edit this post later", record.id);
    }
    Ok(())
}

async fn pull_cmd(config: &Config, id: i64, out: &PathBuf) -> Result<()> {
    let session = open_session(config).await?;

    let Some(record) = session.find(id) else {
        bail!("No post with id {}", id);
    };

    let slug = record.slug.clone().unwrap_or_else(|| slugify(&record.title));
    let body = session.seed_body(record).await;

    fs::create_dir_all(out)?;
    let body_file = format!("{}.html", slug);
    let draft_path = out.join(format!("{}.toml", slug));
    fs::write(out.join(&body_file), body)?;
    fs::write(&draft_path, render_draft(record, &body_file))?;

    println!("Wrote {} and {}", draft_path.display(), out.join(&body_file).display());
    Ok(())
}

async fn delete_cmd(config: &Config, id: i64, yes: bool) -> Result<()> {
    let mut session = open_session(config).await?;

    let Some(record) = session.find(id) else {
        bail!("No post with id {}", id);
    };

    if !yes && !confirm(&format!("Delete \"{}\"?", record.title))? {
        println!("Aborted.");
        return Ok(());
    }

    session.delete(id).await?;
    println!("Post {} deleted. The post directory stays behind and needs manual cleanup.", id);
    Ok(())
}

async fn images_cmd(config: &Config, command: ImagesCommand) -> Result<()> {
    let store = open_store(config)?;
    let images_dir = &config.paths.images_dir;

    match command {
        ImagesCommand::List => {
            let images = media::list_images(&store, images_dir).await?;
            if images.is_empty() {
                println!("No images found in {}.", images_dir);
            }
            for image in images {
                println!("{:<40}  {}", image.name, image.public_url);
            }
        }
        ImagesCommand::Upload { file } => {
            let bytes = fs::read(&file)
                .with_context(|| format!("Error reading {}", file.display()))?;
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("The file needs a usable name")?;

            let path = media::upload_image(&store, images_dir, &bytes, name).await?;
            println!("Uploaded. Use image = \"{}\" in drafts.", path);
        }
        ImagesCommand::Search { query } => {
            let Some(ref unsplash) = config.unsplash else {
                bail!("Image search needs the [unsplash] config section");
            };

            let library = StockLibrary::new(&unsplash.access_key, unsplash.page_size)?;
            match library.search(&query).await {
                Ok(images) => {
                    if images.is_empty() {
                        println!("No results for \"{}\".", query);
                    }
                    for image in images {
                        println!("{}", image.full_url);
                    }
                }
                Err(e) => {
                    // Search failures are reported, not fatal
                    warn!("{}", e);
                    println!("No results for \"{}\".", query);
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg_path = config_path(&args);
    let config = read_config(&cfg_path)
        .with_context(|| format!("Error loading configuration from {}", cfg_path.display()))?;
    configure_logger(&config)?;

    match args.command {
        Command::List => list_cmd(&config).await,
        Command::New { title } => scaffold_draft(&title),
        Command::Publish { draft } => publish_cmd(&config, &draft).await,
        Command::Pull { id, out } => pull_cmd(&config, id, &out).await,
        Command::Delete { id, yes } => delete_cmd(&config, id, yes).await,
        Command::Images { command } => images_cmd(&config, command).await,
    }
}
