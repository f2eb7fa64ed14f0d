mod jsonl;

pub use jsonl::JsonlRendererPlugin;
