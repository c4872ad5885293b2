mod input;
mod renderer;
mod view;

pub use input::handle_key;
pub use renderer::Renderer;
pub use view::LogView;
