mod common;

mod healthz;
mod knowledge_qa;
mod knowledge_search;
mod stop;
