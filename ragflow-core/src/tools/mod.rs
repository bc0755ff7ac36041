mod r#trait;
pub mod knowledge;
pub mod thinking;
pub mod todo;
pub mod web;

pub use knowledge::{
    GrepChunksTool, KnowledgeSearchTool, ListKnowledgeChunksTool, QueryKnowledgeGraphTool,
    TOOL_GREP_CHUNKS, TOOL_KNOWLEDGE_SEARCH, TOOL_LIST_KNOWLEDGE_CHUNKS, TOOL_QUERY_KNOWLEDGE_GRAPH,
};
pub use r#trait::Tool;
pub use thinking::{ThinkingTool, TOOL_THINKING};
pub use todo::{TodoReadTool, TodoWriteTool, TOOL_TODO_READ, TOOL_TODO_WRITE};
pub use web::{WebFetchTool, WebSearchProvider, WebSearchTool, TOOL_WEB_FETCH, TOOL_WEB_SEARCH};
