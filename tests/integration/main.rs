
mod template_ops;
