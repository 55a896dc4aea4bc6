//! `toolmux-calculator`: the built-in calculator tool server on stdio.

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    toolmux_mcp::calculator::serve(tokio::io::stdin(), tokio::io::stdout()).await
}
