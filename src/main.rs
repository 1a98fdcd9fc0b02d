use clap::{Parser, Subcommand};
use folio::navigate::{self, Resolution, SearchFilter, SortMode};
use folio::types::FolderNode;
use folio::{config, logging, output, scan, server};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Markdown blog indexer and admin backend")]
#[command(long_about = "\
Markdown blog indexer and admin backend

Posts are markdown files with a metadata header; folders become sections.
Images named after a post or folder become its cover.

Site structure:

  site/
  ├── config.toml                  # Optional, see 'folio gen-config'
  ├── posts/
  │   ├── index.json               # Generated by 'folio build'
  │   ├── about.md
  │   └── travel/
  │       ├── lisbon.md
  │       └── japan/
  │           └── tokyo.md
  └── public/posts/
      ├── travel.japan.png         # Cover for the travel/japan folder
      └── travel.japan.tokyo.webp  # Cover for travel/japan/tokyo.md

Post header:

  <!-- $header -->
  Title: \"Tokyo Nights\"
  Description: \"Neon and ramen\"
  ImageURL: \"tokyo-cover\"
  Date: \"2025-03-10\"
  <!-- $/header -->

Run 'folio gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Site root directory
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan posts and write the index
    Build,
    /// Resolve a path (folder or post) and print it
    Show {
        /// Path below the posts root, e.g. travel/japan/tokyo
        #[arg(default_value = "")]
        path: String,
    },
    /// Search posts and folders
    Search {
        /// Substring, glob with '*', or /regex/
        query: String,
        /// Only search below this folder
        #[arg(long, default_value = "")]
        under: String,
        /// all, files, or folders
        #[arg(long, default_value = "all")]
        filter: SearchFilter,
        /// name-asc, name-desc, newest, or oldest
        #[arg(long, default_value_t = SortMode::Newest)]
        sort: SortMode,
    },
    /// List every folder
    Folders,
    /// Run the admin API server
    Serve,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let load_config = || config::load_config(&cli.root);

    match cli.command {
        Command::Build => {
            let site_config = load_config()?;
            println!("==> Scanning {}", cli.root.join(site_config.posts_dir()).display());
            let tree = scan::scan_site(&cli.root, &site_config)?;
            let index_path = cli.root.join(&site_config.content.index_file);
            scan::write_index(&tree, &index_path)?;
            output::print_index(&tree);
            println!("==> Wrote {}", index_path.display());
        }
        Command::Show { path } => {
            let site_config = load_config()?;
            let tree = load_tree(&cli.root, &site_config)?;
            let segments = navigate::split_path(&path, site_config.posts_dir());
            output::print_resolution(&path, &navigate::resolve(&tree, &segments));
        }
        Command::Search {
            query,
            under,
            filter,
            sort,
        } => {
            let site_config = load_config()?;
            let tree = load_tree(&cli.root, &site_config)?;
            let base = navigate::split_path(&under, site_config.posts_dir());
            let node = match navigate::resolve(&tree, &base) {
                Resolution::Root(node) | Resolution::Folder { node, .. } => node,
                _ => return Err(format!("not a folder: {under}").into()),
            };
            let mut results = navigate::search(node, &base, &query, filter);
            navigate::sort(&mut results, sort);
            output::print_search_results(&query, &results);
        }
        Command::Folders => {
            let site_config = load_config()?;
            let tree = load_tree(&cli.root, &site_config)?;
            let folders: Vec<String> = tree
                .folder_paths()
                .into_iter()
                .map(|p| format!("/{p}/"))
                .collect();
            output::print_folders(&folders);
        }
        Command::Serve => {
            let site_config = load_config()?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(server::serve(&site_config, &cli.root))?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// The published index, or a fresh in-memory scan when there is none yet.
fn load_tree(root: &Path, site_config: &config::SiteConfig) -> Result<FolderNode, scan::ScanError> {
    let index_path = root.join(&site_config.content.index_file);
    if index_path.is_file() {
        return scan::load_index(&index_path);
    }
    info!(index = %index_path.display(), "no index yet, scanning posts");
    scan::scan_site(root, site_config)
}
