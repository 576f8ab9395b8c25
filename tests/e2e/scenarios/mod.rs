mod concurrency;
mod graph_model;
mod trash_lifecycle;
