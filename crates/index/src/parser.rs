//! Language detection from file extension, used to stamp the `language`
//! field on File/FileChunk records and to fill the metadata preface
//! prepended before embedding. Every file gets a language name, even
//! unrecognized extensions fall back to `"text"` — unlike a code-only
//! indexer, this never gates whether a file is eligible for indexing.

use std::path::Path;

/// Map a file extension to a human-readable language name.
pub fn detect_language(path: &Path) -> String {
  let ext = match path.extension().and_then(|e| e.to_str()) {
    Some(ext) => ext.to_lowercase(),
    None => return "text".to_string(),
  };

  language_for_extension(&ext).unwrap_or("text").to_string()
}

fn language_for_extension(ext: &str) -> Option<&'static str> {
  Some(match ext {
    "rs" => "rust",
    "py" => "python",
    "ts" => "typescript",
    "tsx" => "tsx",
    "js" | "mjs" | "cjs" => "javascript",
    "jsx" => "jsx",
    "go" => "go",
    "java" => "java",
    "c" | "h" => "c",
    "cpp" | "cc" | "hpp" | "hh" => "cpp",
    "cs" => "csharp",
    "rb" => "ruby",
    "php" => "php",
    "swift" => "swift",
    "kt" | "kts" => "kotlin",
    "scala" => "scala",
    "r" => "r",
    "jl" => "julia",
    "lua" => "lua",
    "pl" => "perl",
    "sh" | "bash" | "zsh" | "fish" => "shell",
    "ps1" => "powershell",
    "sql" => "sql",
    "graphql" | "gql" => "graphql",
    "proto" => "protobuf",
    "toml" => "toml",
    "yaml" | "yml" => "yaml",
    "json" => "json",
    "xml" => "xml",
    "html" | "htm" => "html",
    "css" => "css",
    "scss" => "scss",
    "sass" => "sass",
    "less" => "less",
    "vue" => "vue",
    "svelte" => "svelte",
    "astro" => "astro",
    "md" => "markdown",
    "mdx" => "mdx",
    "rst" => "restructuredtext",
    "tex" => "latex",
    "dockerfile" => "dockerfile",
    "makefile" | "mk" => "makefile",
    "cmake" => "cmake",
    "gradle" => "gradle",
    "zig" => "zig",
    "nim" => "nim",
    "elm" => "elm",
    "clj" | "cljs" => "clojure",
    "ex" | "exs" => "elixir",
    "erl" | "hrl" => "erlang",
    "hs" => "haskell",
    "ml" | "mli" => "ocaml",
    "fs" | "fsi" => "fsharp",
    "v" | "sv" => "verilog",
    "vhdl" => "vhdl",
    "pdf" => "pdf",
    "docx" => "docx",
    "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" => "image",
    _ => return None,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detects_common_languages() {
    assert_eq!(detect_language(Path::new("main.rs")), "rust");
    assert_eq!(detect_language(Path::new("app.py")), "python");
    assert_eq!(detect_language(Path::new("index.ts")), "typescript");
  }

  #[test]
  fn unknown_extension_falls_back_to_text() {
    assert_eq!(detect_language(Path::new("readme.txt")), "text");
    assert_eq!(detect_language(Path::new("no_extension")), "text");
  }

  #[test]
  fn detects_document_and_image_kinds() {
    assert_eq!(detect_language(Path::new("report.pdf")), "pdf");
    assert_eq!(detect_language(Path::new("photo.jpg")), "image");
  }
}
