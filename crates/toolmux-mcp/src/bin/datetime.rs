//! `toolmux-datetime`: the built-in date and time tool server on stdio.

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    toolmux_mcp::datetime::serve(tokio::io::stdin(), tokio::io::stdout()).await
}
