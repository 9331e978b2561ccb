use vergen::EmitBuilder;

fn main() {
    // 生成构建时间与 git 版本信息，启动日志中输出
    EmitBuilder::builder()
        .build_timestamp()
        .git_sha(true)
        .emit()
        .expect("Failed to generate build information");
}
